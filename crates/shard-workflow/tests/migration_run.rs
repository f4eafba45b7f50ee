use ledger_domain::{DomainStubs, InMemoryLedgerStore, InMemoryShardStoreProvider, LedgerTable, ShardRegistry,
                    ShardState, ShardStore, STUB_TRANSACTION_ID_BASE};
use migration_flow::{MigrateState, MigrationStateRepository};
use shard_workflow::{chain, create_operation, merkle_root, remaining_plan, verify_chain, BlockchainConfig, HeightConfig,
                     MigrationError, ShardingConfig, ShardingEngine, ShardingEngineFactory};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
  dir: TempDir,
  ledger: Arc<InMemoryLedgerStore>,
  provider: Arc<InMemoryShardStoreProvider>,
  engine: ShardingEngine,
}

// 2 transacciones por bloque: la altura h tiene los db_id 2h+1 y 2h+2.
fn fixture(blocks: i32, backup_db: bool) -> Fixture {
  let dir = tempfile::tempdir().expect("tempdir");
  let ledger = Arc::new(DomainStubs::sample_ledger(blocks, 2).expect("ledger"));
  let config = ShardingConfig { data_dir: dir.path().to_path_buf(),
                                backup_db,
                                commit_batch_size: 7,
                                ..ShardingConfig::default() };
  let heights = BlockchainConfig::new(vec![HeightConfig::new(0, true, 100)]).expect("heights");
  let (engine, provider) = ShardingEngineFactory::in_memory(config, heights, ledger.clone());
  Fixture { dir, ledger, provider, engine }
}

fn phase(ledger: &InMemoryLedgerStore, db_id: i64, height: i32, finish: i32) {
  DomainStubs::phase_transaction(ledger, STUB_TRANSACTION_ID_BASE + db_id, height, finish).expect("poll");
}

fn signatures(from: i32, to: i32) -> Vec<Vec<u8>> {
  (from..to).map(|h| DomainStubs::block(h).block_signature).collect()
}

#[derive(Debug, PartialEq)]
struct Outcome {
  shard_hash: Option<Vec<u8>>,
  archive_hash: Option<Vec<u8>>,
  shard_blocks: i64,
  shard_txs: i64,
  main_blocks: usize,
  main_txs: Vec<i64>,
}

fn outcome(f: &Fixture, shard_id: i64) -> Outcome {
  let shard = f.ledger.get_shard(shard_id).unwrap().expect("shard");
  let store = f.provider.store(shard_id).expect("store");
  Outcome { shard_hash: shard.shard_hash,
            archive_hash: shard.archive_hash,
            shard_blocks: store.count(LedgerTable::Block).unwrap(),
            shard_txs: store.count(LedgerTable::Transaction).unwrap(),
            main_blocks: f.ledger.block_count(),
            main_txs: f.ledger.transaction_db_ids() }
}

#[test]
fn full_run_moves_range_into_shard() {
  let f = fixture(150, false);
  phase(&f.ledger, 21, 10, 120); // abierto en el corte
  phase(&f.ledger, 41, 20, 90); // ya resuelto

  assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Completed);

  let shard = f.ledger.get_shard(1).unwrap().expect("shard");
  assert_eq!(shard.shard_state, ShardState::Full);
  assert_eq!(shard.shard_height, 100);
  assert_eq!(shard.shard_hash, Some(merkle_root(&signatures(0, 100))));
  assert_eq!(shard.generator_ids.len(), 3);
  assert!(shard.archive_hash.is_some());

  let out = outcome(&f, 1);
  assert_eq!(out.shard_blocks, 100);
  assert_eq!(out.shard_txs, 199);
  assert_eq!(out.main_blocks, 50);
  assert_eq!(out.main_txs.len(), 101);
  assert!(out.main_txs.contains(&21));
  assert!(!out.main_txs.contains(&41));
  assert!(out.main_txs.iter().filter(|id| **id != 21).all(|id| *id > 200));

  let record = f.engine.executor.current_record().unwrap().expect("record");
  assert_eq!(record.checkpoint, MigrateState::Completed);
  assert!(record.failed_step.is_none());

  let archive = f.dir.path().join(format!("apl-blockchain-shard-1-chain-{}.zip", f.engine.config.chain_id));
  assert!(archive.exists());
  let export = f.dir.path().join("export").join(format!("apl-blockchain-shard-1-chain-{}", f.engine.config.chain_id));
  for table in ["account", "alias", "currency", "block", "transaction", "block_index", "transaction_shard_index", "shard"] {
    assert!(export.join(format!("{}.csv", table)).exists(), "falta {}", table);
  }
  assert!(!export.join("account_ledger.csv").exists());
}

#[test]
fn resume_from_every_checkpoint_matches_uninterrupted_run() {
  let baseline = fixture(150, true);
  phase(&baseline.ledger, 35, 17, 150);
  assert_eq!(baseline.engine.executor.run(100).unwrap(), MigrateState::Completed);
  let expected = outcome(&baseline, 1);

  let plan = remaining_plan(MigrateState::Init, true).unwrap();
  for done in 0..plan.len() {
    let f = fixture(150, true);
    phase(&f.ledger, 35, 17, 150);
    for entry in &plan[..done] {
      let op = create_operation(entry.kind);
      assert_eq!(f.engine.executor.run_one(100, op.as_ref()).unwrap(), entry.result);
    }
    if done > 0 {
      let record = f.engine.executor.current_record().unwrap().expect("record");
      assert_eq!(record.checkpoint, plan[done - 1].result);
    }
    assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Completed, "reanudando tras {} pasos", done);
    assert_eq!(outcome(&f, 1), expected, "reanudando tras {} pasos", done);
  }
}

#[test]
fn resume_after_partial_copy_does_not_duplicate() {
  let f = fixture(150, false);
  let init = create_operation(remaining_plan(MigrateState::Init, false).unwrap()[0].kind);
  assert_eq!(f.engine.executor.run_one(100, init.as_ref()).unwrap(), MigrateState::ShardSchemaCreated);

  // corte a mitad de la copia
  let store = f.provider.store(1).expect("store");
  let partial: Vec<_> = (0..10).map(DomainStubs::block).collect();
  store.insert_blocks(&partial).unwrap();
  let mut record = f.engine.states.load(1).unwrap().expect("record");
  record.advance(MigrateState::DataCopyStarted);
  f.engine.states.save(&record).unwrap();

  assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Completed);
  assert_eq!(store.count(LedgerTable::Block).unwrap(), 100);
  assert_eq!(store.count(LedgerTable::Transaction).unwrap(), 200);
}

#[test]
fn copy_is_idempotent() {
  let f = fixture(60, false);
  phase(&f.ledger, 3, 1, 80);
  let plan = remaining_plan(MigrateState::Init, false).unwrap();
  let init = create_operation(plan[0].kind);
  let copy = create_operation(plan[1].kind);
  f.engine.executor.run_one(50, init.as_ref()).unwrap();
  assert_eq!(f.engine.executor.run_one(50, copy.as_ref()).unwrap(), MigrateState::DataCopied);
  assert_eq!(f.engine.executor.run_one(50, copy.as_ref()).unwrap(), MigrateState::DataCopied);
  let store = f.provider.store(1).expect("store");
  assert_eq!(store.count(LedgerTable::Block).unwrap(), 50);
  assert_eq!(store.count(LedgerTable::Transaction).unwrap(), 99);
}

#[test]
fn delete_keeps_excluded_transactions_across_batches() {
  let f = fixture(40, false);
  // db_id 7, 14 y 21 caen al final de lotes de 7
  for (db_id, height) in [(7, 3), (14, 6), (21, 10), (22, 10)] {
    phase(&f.ledger, db_id, height, 45);
  }
  assert_eq!(f.engine.executor.run(30).unwrap(), MigrateState::Completed);
  let main = f.ledger.transaction_db_ids();
  for id in [7, 14, 21, 22] {
    assert!(main.contains(&id), "se borró {}", id);
  }
  assert_eq!(main.len(), 4 + 20);
  assert_eq!(f.provider.store(1).unwrap().count(LedgerTable::Transaction).unwrap(), 56);
}

#[test]
fn empty_range_fails_with_integrity_error() {
  let f = fixture(0, false);
  assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Failed);

  let err = f.engine.executor.take_last_error().expect("error");
  assert!(matches!(err.root(), MigrationError::Integrity(_)));
  let record = f.engine.executor.current_record().unwrap().expect("record");
  assert_eq!(record.status, MigrateState::Failed);
  assert_eq!(record.checkpoint, MigrateState::DataCopied);
  assert_eq!(record.failed_step.as_deref(), Some("CreateShardSchema(full)"));
  let shard = f.ledger.get_shard(1).unwrap().expect("shard");
  assert_ne!(shard.shard_state, ShardState::Full);
}

#[test]
fn unreadable_source_fails_with_integrity_error() {
  let f = fixture(150, false);
  let plan = remaining_plan(MigrateState::Init, false).unwrap();
  for entry in &plan[..2] {
    f.engine.executor.run_one(100, create_operation(entry.kind).as_ref()).unwrap();
  }
  f.ledger.set_unreadable(true);
  assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Failed);

  let err = f.engine.executor.take_last_error().expect("error");
  assert!(matches!(err.root(), MigrationError::Integrity(_)));
  f.ledger.set_unreadable(false);
  let shard = f.ledger.get_shard(1).unwrap().expect("shard");
  assert_ne!(shard.shard_state, ShardState::Full);
}

#[test]
fn target_at_or_below_last_shard_is_rejected() {
  let f = fixture(250, false);
  assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Completed);
  for target in [100, 60] {
    assert!(matches!(f.engine.executor.run(target), Err(MigrationError::Configuration(_))));
  }
  assert!(f.engine.states.load(2).unwrap().is_none());
  assert!(f.ledger.get_shard(2).unwrap().is_none());
  assert_eq!(f.engine.executor.last_shard_height().unwrap(), 100);

  assert_eq!(f.engine.executor.run(200).unwrap(), MigrateState::Completed);
  let record = f.engine.executor.current_record().unwrap().expect("record");
  assert_eq!((record.shard_id, record.start_height, record.target_height), (2, 100, 200));
}

#[test]
fn failed_backup_keeps_checkpoint_and_resumes() {
  let f = fixture(120, true);
  let mut events = f.engine.executor.notifier().subscribe();
  f.ledger.set_backup_failure(true);
  assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Failed);
  let record = f.engine.executor.current_record().unwrap().expect("record");
  assert_eq!(record.checkpoint, MigrateState::Init);
  assert_eq!(record.failed_step.as_deref(), Some("BackupDbBeforeShard"));
  assert_eq!(events.try_recv().unwrap().state, MigrateState::Failed);
  assert!(f.ledger.backups().is_empty());

  f.ledger.set_backup_failure(false);
  assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Completed);
  assert_eq!(f.ledger.backups().len(), 1);
  let mut states = Vec::new();
  while let Ok(ev) = events.try_recv() {
    assert_eq!(ev.shard_id, 1);
    states.push(ev.state);
  }
  assert_eq!(states,
             vec![MigrateState::MainDbBackedUp,
                  MigrateState::ShardSchemaCreated,
                  MigrateState::DataCopyStarted,
                  MigrateState::DataCopied,
                  MigrateState::ShardSchemaFull,
                  MigrateState::SecondaryIndexStarted,
                  MigrateState::SecondaryIndexUpdated,
                  MigrateState::CsvExportStarted,
                  MigrateState::CsvExported,
                  MigrateState::ZipArchiveStarted,
                  MigrateState::ZipArchived,
                  MigrateState::DataRemoveStarted,
                  MigrateState::DataRemoved,
                  MigrateState::Completed]);
}

#[test]
fn pending_shard_ignores_new_target() {
  let f = fixture(400, false);
  let init = create_operation(remaining_plan(MigrateState::Init, false).unwrap()[0].kind);
  f.engine.executor.run_one(100, init.as_ref()).unwrap();
  assert_eq!(f.engine.executor.run(300).unwrap(), MigrateState::Completed);
  let shard = f.ledger.get_shard(1).unwrap().expect("shard");
  assert_eq!(shard.shard_height, 100);
  assert!(f.ledger.get_shard(2).unwrap().is_none());
}

#[test]
fn consecutive_shards_chain_their_hashes() {
  let f = fixture(250, false);
  assert_eq!(f.engine.executor.run(100).unwrap(), MigrateState::Completed);
  assert_eq!(f.engine.executor.run(200).unwrap(), MigrateState::Completed);

  let first = f.ledger.get_shard(1).unwrap().and_then(|s| s.shard_hash).expect("hash 1");
  let second = f.ledger.get_shard(2).unwrap().and_then(|s| s.shard_hash).expect("hash 2");
  let roots = vec![merkle_root(&signatures(0, 100)), merkle_root(&signatures(100, 200))];
  assert_eq!(second, chain(Some(first.as_slice()), &roots[1]));
  assert!(verify_chain(&[first.clone(), second.clone()], &roots));
  assert!(!verify_chain(&[second, first], &roots));
  assert_eq!(f.provider.store(2).unwrap().count(LedgerTable::Block).unwrap(), 100);
  assert_eq!(f.engine.catalog.full_stores().unwrap().len(), 2);
}

#[test]
fn terminal_checkpoints_are_rejected() {
  let f = fixture(10, false);
  for state in [MigrateState::Completed, MigrateState::Failed] {
    assert!(matches!(remaining_plan(state, false), Err(MigrationError::Configuration(_))));
    assert!(matches!(f.engine.executor.create_all_operations(1, 5, state), Err(MigrationError::Configuration(_))));
  }
  assert!(matches!(f.engine.executor.run(0), Err(MigrationError::Configuration(_))));
}

#[test]
fn remaining_plan_is_a_suffix_of_the_full_plan() {
  for backup in [true, false] {
    let full = remaining_plan(MigrateState::Init, backup).unwrap();
    for state in MigrateState::ALL.iter().filter(|s| !s.is_terminal()) {
      let rest = remaining_plan(*state, backup).unwrap();
      assert!(!rest.is_empty());
      assert!(rest[0].entered_from.contains(state), "{:?}", state);
      assert_eq!(full[full.len() - rest.len()..], rest[..], "{:?}", state);
    }
  }
}
