use ledger_domain::{DerivedRow, DomainStubs, LedgerTable, PhasingPoll, ShardRegistry, ShardSchemaVersion, ShardState,
                    ShardStore, STUB_TRANSACTION_ID_BASE};
use migration_flow::{MigrateState, MigrationStateRepository};
use shard_persistence::{DieselLedgerStore, SqliteShardStoreProvider};
use shard_workflow::{BlockchainConfig, HeightConfig, ShardingConfig, ShardingEngineFactory};
use std::sync::Arc;

fn seeded_store(dir: &std::path::Path, blocks: i32) -> Arc<DieselLedgerStore> {
  let url = dir.join("main.sqlite").to_string_lossy().to_string();
  let store = DieselLedgerStore::new(&url).expect("store");
  let mut txs = Vec::new();
  let mut derived = Vec::new();
  for h in 0..blocks {
    txs.push(DomainStubs::transaction(h as i64 + 1, h, 0));
    derived.push(DerivedRow { db_id: h as i64 + 1, height: h, latest: true, payload: format!("{{\"h\":{}}}", h) });
  }
  store.insert_blocks(&(0..blocks).map(DomainStubs::block).collect::<Vec<_>>()).expect("blocks");
  store.insert_transactions(&txs).expect("txs");
  store.insert_derived_rows("account", &derived).expect("account");
  store.insert_phasing_polls(&[PhasingPoll { db_id: 1,
                                             transaction_id: STUB_TRANSACTION_ID_BASE + 5,
                                             height: 4,
                                             finish_height: 80 }])
       .expect("poll");
  Arc::new(store)
}

#[test]
fn migration_on_sqlite_writes_shard_file_and_state() {
  let dir = tempfile::tempdir().unwrap();
  let store = seeded_store(dir.path(), 60);
  let config = ShardingConfig { data_dir: dir.path().join("data"),
                                backup_db: true,
                                commit_batch_size: 8,
                                ..ShardingConfig::default() };
  let provider = Arc::new(SqliteShardStoreProvider::new(config.data_dir.clone()));
  let heights = BlockchainConfig::new(vec![HeightConfig::new(0, true, 50)]).unwrap();
  let engine = ShardingEngineFactory::from_sqlite(config.clone(), heights, store.clone(), provider);

  assert_eq!(engine.executor.run(50).unwrap(), MigrateState::Completed);

  let shard = store.get_shard(1).unwrap().expect("shard");
  assert_eq!(shard.shard_state, ShardState::Full);
  assert_eq!(shard.generator_ids.len(), 3);
  assert_eq!(store.count_rows("block").unwrap(), 10);
  // la transacción 5 sigue pendiente de phasing en la altura 50
  assert_eq!(store.count_rows("transaction").unwrap(), 11);
  assert_eq!(store.count_rows("block_index").unwrap(), 50);
  assert_eq!(store.count_rows("transaction_shard_index").unwrap(), 49);

  let shard_store = engine.catalog.get_shard_store(1).expect("store en caché");
  assert_eq!(shard_store.schema_version().unwrap(), Some(ShardSchemaVersion::Full));
  assert_eq!(shard_store.count(LedgerTable::Block).unwrap(), 50);
  assert_eq!(shard_store.count(LedgerTable::Transaction).unwrap(), 49);

  let name = format!("apl-blockchain-shard-1-chain-{}", config.chain_id);
  assert!(config.data_dir.join(format!("{}.sqlite", name)).exists());
  assert!(config.data_dir.join(format!("{}.zip", name)).exists());
  assert!(config.backup_dir().join(format!("{}-before.sqlite", name)).exists());

  let record = store.load_latest().unwrap().expect("record");
  assert_eq!(record.checkpoint, MigrateState::Completed);
  assert_eq!(record.target_height, 50);

  engine.catalog.shutdown();
  assert!(shard_store.is_closed());
}
