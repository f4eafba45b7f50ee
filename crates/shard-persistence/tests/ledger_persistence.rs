use ledger_domain::{BlockIndex, DerivedRow, DomainStubs, LedgerStore, PhasingPoll, Shard, ShardRegistry, ShardState,
                    TransactionIndex, STUB_TRANSACTION_ID_BASE};
use migration_flow::{MigrateState, MigrationRecord, MigrationStateRepository};
use shard_persistence::DieselLedgerStore;
use tempfile::TempDir;

fn setup_store(blocks: i32, txs_per_block: i64) -> (TempDir, DieselLedgerStore) {
  let dir = tempfile::tempdir().expect("tempdir");
  let url = dir.path().join("main.sqlite").to_string_lossy().to_string();
  let store = DieselLedgerStore::new(&url).expect("store");
  let mut db_id = 0i64;
  let mut all_blocks = Vec::new();
  let mut all_txs = Vec::new();
  for h in 0..blocks {
    all_blocks.push(DomainStubs::block(h));
    for idx in 0..txs_per_block {
      db_id += 1;
      all_txs.push(DomainStubs::transaction(db_id, h, idx as i16));
    }
  }
  store.insert_blocks(&all_blocks).expect("blocks");
  store.insert_transactions(&all_txs).expect("txs");
  (dir, store)
}

#[test]
fn range_reads_follow_cursor_and_height() {
  let (_dir, store) = setup_store(10, 2);
  let blocks = store.blocks_after(0, 3, 6, 100).unwrap();
  assert_eq!(blocks.iter().map(|b| b.height).collect::<Vec<_>>(), vec![3, 4, 5]);
  let txs = store.transactions_after(4, 0, 10, 3).unwrap();
  assert_eq!(txs.iter().map(|t| t.db_id).collect::<Vec<_>>(), vec![5, 6, 7]);
  assert_eq!(store.block_signatures(0, 10).unwrap().len(), 10);
  let prev = store.blocks_before(5, 3).unwrap();
  assert_eq!(prev.iter().map(|b| b.height).collect::<Vec<_>>(), vec![4, 3, 2]);
}

#[test]
fn phased_transactions_and_deletes() {
  let (_dir, store) = setup_store(10, 1);
  store.insert_phasing_polls(&[PhasingPoll { db_id: 1,
                                             transaction_id: STUB_TRANSACTION_ID_BASE + 2,
                                             height: 1,
                                             finish_height: 50 }])
       .unwrap();
  let excluded = store.unsettled_phased_db_ids(0, 8).unwrap();
  assert_eq!(excluded.into_iter().collect::<Vec<_>>(), vec![2]);

  assert_eq!(store.delete_transactions(&[1, 3]).unwrap(), 2);
  assert_eq!(store.count_rows("transaction").unwrap(), 8);
  assert_eq!(store.delete_blocks(&[1, 2, 3]).unwrap(), 3);
  assert_eq!(store.count_rows("block").unwrap(), 7);
}

#[test]
fn secondary_indexes_ignore_duplicates() {
  let (_dir, store) = setup_store(3, 1);
  let rows = vec![BlockIndex { block_id: 1, block_height: 0 }, BlockIndex { block_id: 2, block_height: 1 }];
  assert_eq!(store.save_block_index(&rows).unwrap(), 2);
  assert_eq!(store.save_block_index(&rows).unwrap(), 0);
  assert_eq!(store.block_index_rows(1).unwrap().len(), 1);

  let tx = DomainStubs::transaction(1, 0, 0);
  let idx = TransactionIndex::from_transaction(&tx);
  assert_eq!(idx.partial_transaction_hash, tx.full_hash[8..].to_vec());
  store.save_transaction_index(&[idx.clone()]).unwrap();
  store.save_transaction_index(&[idx]).unwrap();
  assert_eq!(store.transaction_index_rows(10).unwrap().len(), 1);
}

#[test]
fn derived_rows_are_filtered_by_height() {
  let (_dir, store) = setup_store(1, 0);
  let rows: Vec<DerivedRow> =
    (0..5).map(|h| DerivedRow { db_id: h as i64 + 1, height: h, latest: true, payload: "{}".into() }).collect();
  store.insert_derived_rows("account", &rows).unwrap();
  assert_eq!(store.derived_rows("account", 3).unwrap().len(), 3);
  assert!(store.derived_rows("no such table", 3).is_err());
}

#[test]
fn registry_and_migration_state_roundtrip() {
  let (_dir, store) = setup_store(1, 0);
  assert_eq!(store.next_shard_id().unwrap(), 1);
  let mut shard = Shard::new(1, 100);
  shard.shard_hash = Some(vec![1, 2, 3]);
  shard.generator_ids = vec![7, 8, 9];
  shard.block_timeouts = vec![0, 1, 2];
  shard.block_timestamps = vec![30, 20, 10];
  store.save_shard(&shard).unwrap();
  assert_eq!(store.get_shard(1).unwrap(), Some(shard.clone()));
  assert!(store.last_completed_or_archived_shard().unwrap().is_none());

  shard.shard_state = ShardState::Full;
  store.save_shard(&shard).unwrap();
  assert_eq!(store.last_completed_or_archived_shard().unwrap().map(|s| s.shard_id), Some(1));
  assert_eq!(store.next_shard_id().unwrap(), 2);

  let mut rec = MigrationRecord::new(2, 100, 200);
  rec.advance(MigrateState::DataCopyStarted);
  rec.fail("CopyData");
  store.save(&rec).unwrap();
  let loaded = store.load_latest().unwrap().unwrap();
  assert_eq!(loaded.checkpoint, MigrateState::DataCopyStarted);
  assert_eq!(loaded.status, MigrateState::Failed);
  assert_eq!(loaded.failed_step.as_deref(), Some("CopyData"));
}

#[test]
fn backup_writes_complete_file() {
  let (dir, store) = setup_store(4, 1);
  let target = dir.path().join("backup").join("main-before.sqlite");
  store.backup(&target).unwrap();
  assert!(target.exists());
  let copy = DieselLedgerStore::new(&target.to_string_lossy()).unwrap();
  assert_eq!(copy.count_rows("block").unwrap(), 4);
  assert!(!dir.path().join("backup").join("main-before.sqlite.tmp").exists());
}
