// Archivo: record.rs
// Propósito: registro durable del avance de la migración de un shard.
use crate::state::MigrateState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progreso de una ejecución de migración, uno por shard.
///
/// `checkpoint` es el último estado alcanzado con éxito y nunca retrocede;
/// `status` es el estado más reciente y puede ser `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
  pub shard_id: i64,
  pub target_height: i32,
  pub start_height: i32,
  pub checkpoint: MigrateState,
  pub status: MigrateState,
  pub failed_step: Option<String>,
  pub updated_at: DateTime<Utc>,
}

impl MigrationRecord {
  pub fn new(shard_id: i64, start_height: i32, target_height: i32) -> Self {
    Self { shard_id,
           target_height,
           start_height,
           checkpoint: MigrateState::Init,
           status: MigrateState::Init,
           failed_step: None,
           updated_at: Utc::now() }
  }

  /// Registra un estado alcanzado. El checkpoint sólo avanza.
  pub fn advance(&mut self, state: MigrateState) {
    if state != MigrateState::Failed && state > self.checkpoint {
      self.checkpoint = state;
    }
    self.status = state;
    self.failed_step = None;
    self.updated_at = Utc::now();
  }

  /// Marca la ejecución como fallida en `step` sin tocar el checkpoint.
  pub fn fail(&mut self, step: &str) {
    self.status = MigrateState::Failed;
    self.failed_step = Some(step.to_string());
    self.updated_at = Utc::now();
  }

  pub fn is_completed(&self) -> bool {
    self.checkpoint == MigrateState::Completed
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn failure_keeps_checkpoint() {
    let mut rec = MigrationRecord::new(1, 0, 100);
    rec.advance(MigrateState::ShardSchemaCreated);
    rec.advance(MigrateState::DataCopyStarted);
    rec.fail("CopyData");
    assert_eq!(rec.checkpoint, MigrateState::DataCopyStarted);
    assert_eq!(rec.status, MigrateState::Failed);
    assert_eq!(rec.failed_step.as_deref(), Some("CopyData"));

    rec.advance(MigrateState::DataCopied);
    assert_eq!(rec.checkpoint, MigrateState::DataCopied);
    assert!(rec.failed_step.is_none());
  }

  #[test]
  fn checkpoint_never_regresses() {
    let mut rec = MigrationRecord::new(1, 0, 100);
    rec.advance(MigrateState::DataCopied);
    rec.advance(MigrateState::ShardSchemaCreated);
    assert_eq!(rec.checkpoint, MigrateState::DataCopied);
  }
}
