use migration_flow::{InMemoryMigrationStateRepository, MigrateState, MigrationRecord, MigrationStateRepository};

#[test]
fn latest_record_is_highest_shard() {
  let repo = InMemoryMigrationStateRepository::new();
  assert!(repo.load_latest().unwrap().is_none());

  let mut first = MigrationRecord::new(1, 0, 100);
  first.advance(MigrateState::Completed);
  repo.save(&first).unwrap();
  repo.save(&MigrationRecord::new(2, 100, 200)).unwrap();

  let latest = repo.load_latest().unwrap().unwrap();
  assert_eq!(latest.shard_id, 2);
  assert_eq!(latest.checkpoint, MigrateState::Init);
  assert!(repo.load(1).unwrap().unwrap().is_completed());
  assert_eq!(repo.all().unwrap().len(), 2);
}

#[test]
fn save_replaces_existing_record() {
  let repo = InMemoryMigrationStateRepository::new();
  let mut rec = MigrationRecord::new(5, 0, 100);
  repo.save(&rec).unwrap();
  rec.advance(MigrateState::DataCopyStarted);
  rec.fail("CopyData");
  repo.save(&rec).unwrap();

  let loaded = repo.load(5).unwrap().unwrap();
  assert_eq!(loaded.status, MigrateState::Failed);
  assert_eq!(loaded.checkpoint, MigrateState::DataCopyStarted);
  assert_eq!(repo.all().unwrap().len(), 1);
}

#[test]
fn save_failure_is_reported() {
  let repo = InMemoryMigrationStateRepository::new();
  repo.set_save_failure(true);
  assert!(repo.save(&MigrationRecord::new(1, 0, 10)).is_err());
  assert!(repo.load(1).unwrap().is_none());
}
