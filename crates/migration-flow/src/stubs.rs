// Archivo: stubs.rs
// Propósito: repositorio en memoria para pruebas y wiring rápido. No es
// durable.
use crate::errors::{FlowError, Result};
use crate::record::MigrationRecord;
use crate::repository::MigrationStateRepository;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct InMemoryMigrationStateRepository {
  records: Mutex<BTreeMap<i64, MigrationRecord>>,
  fail_saves: AtomicBool,
}

impl InMemoryMigrationStateRepository {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<i64, MigrationRecord>>> {
    self.records
        .lock()
        .map_err(|e| FlowError::Storage(format!("Mutex poisoned: {}", e)))
  }

  /// Hace que los `save` siguientes fallen.
  pub fn set_save_failure(&self, fail: bool) {
    self.fail_saves.store(fail, Ordering::SeqCst);
  }
}

impl MigrationStateRepository for InMemoryMigrationStateRepository {
  fn load_latest(&self) -> Result<Option<MigrationRecord>> {
    Ok(self.lock()?.values().next_back().cloned())
  }

  fn load(&self, shard_id: i64) -> Result<Option<MigrationRecord>> {
    Ok(self.lock()?.get(&shard_id).cloned())
  }

  fn save(&self, record: &MigrationRecord) -> Result<()> {
    if self.fail_saves.load(Ordering::SeqCst) {
      return Err(FlowError::Storage("save deshabilitado".to_string()));
    }
    self.lock()?.insert(record.shard_id, record.clone());
    Ok(())
  }

  fn all(&self) -> Result<Vec<MigrationRecord>> {
    Ok(self.lock()?.values().cloned().collect())
  }
}
