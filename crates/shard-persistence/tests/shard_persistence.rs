use ledger_domain::{DomainStubs, LedgerTable, ShardSchemaVersion, ShardStore, ShardStoreProvider};
use shard_persistence::SqliteShardStoreProvider;

#[test]
fn schema_versions_are_detected_and_idempotent() {
  let dir = tempfile::tempdir().unwrap();
  let provider = SqliteShardStoreProvider::new(dir.path());
  let store = provider.open(1, "apl-blockchain-shard-1").unwrap();
  assert_eq!(store.schema_version().unwrap(), None);

  store.apply_schema(ShardSchemaVersion::Init).unwrap();
  store.apply_schema(ShardSchemaVersion::Init).unwrap();
  assert_eq!(store.schema_version().unwrap(), Some(ShardSchemaVersion::Init));

  store.insert_blocks(&[DomainStubs::block(0), DomainStubs::block(1)]).unwrap();
  store.insert_transactions(&[DomainStubs::transaction(1, 0, 0)]).unwrap();
  assert_eq!(store.max_db_id(LedgerTable::Block).unwrap(), Some(2));

  store.apply_schema(ShardSchemaVersion::Full).unwrap();
  store.apply_schema(ShardSchemaVersion::Full).unwrap();
  assert_eq!(store.schema_version().unwrap(), Some(ShardSchemaVersion::Full));
  assert!(store.insert_blocks(&[DomainStubs::block(1)]).is_err());
  assert_eq!(store.count(LedgerTable::Block).unwrap(), 2);
  assert_eq!(store.count(LedgerTable::Transaction).unwrap(), 1);
}

#[test]
fn full_schema_fails_on_duplicate_rows() {
  let dir = tempfile::tempdir().unwrap();
  let provider = SqliteShardStoreProvider::new(dir.path());
  let store = provider.open(2, "dup").unwrap();
  store.apply_schema(ShardSchemaVersion::Init).unwrap();
  store.insert_blocks(&[DomainStubs::block(3), DomainStubs::block(3)]).unwrap();
  assert!(store.apply_schema(ShardSchemaVersion::Full).is_err());
}

#[test]
fn reopened_store_sees_same_file() {
  let dir = tempfile::tempdir().unwrap();
  let provider = SqliteShardStoreProvider::new(dir.path());
  let store = provider.open(3, "reopen").unwrap();
  store.apply_schema(ShardSchemaVersion::Init).unwrap();
  store.insert_blocks(&[DomainStubs::block(0)]).unwrap();
  store.close();
  assert!(store.is_closed());
  assert!(store.count(LedgerTable::Block).is_err());

  let again = provider.open(3, "reopen").unwrap();
  assert_eq!(again.count(LedgerTable::Block).unwrap(), 1);
  assert!(provider.shard_file("reopen").exists());
}
