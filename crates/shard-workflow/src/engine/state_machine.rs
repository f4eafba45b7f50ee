// Archivo: state_machine.rs
// Propósito: tabla ordenada de pasos de la migración. Reanudar desde un
// checkpoint es tomar el sufijo de la tabla que acepta ese estado.
use crate::errors::{MigrationError, Result};
use crate::step::MigrationOperation;
use crate::steps::{BackupDbBeforeShard, CopyData, CreateShardSchema, CsvExport, DeleteCopiedData, FinishSharding,
                   UpdateSecondaryIndex, ZipArchive};
use ledger_domain::ShardSchemaVersion;
use migration_flow::MigrateState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
  BackupDb,
  CreateShardSchemaInit,
  CopyData,
  CreateShardSchemaFull,
  UpdateSecondaryIndex,
  CsvExport,
  ZipArchive,
  DeleteCopiedData,
  FinishSharding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanEntry {
  pub kind: OperationKind,
  /// Estados desde los que arranca este paso.
  pub entered_from: &'static [MigrateState],
  pub started: Option<MigrateState>,
  pub result: MigrateState,
}

use MigrateState as S;

pub const MIGRATION_PLAN: [PlanEntry; 9] =
  [PlanEntry { kind: OperationKind::BackupDb, entered_from: &[S::Init], started: None, result: S::MainDbBackedUp },
   PlanEntry { kind: OperationKind::CreateShardSchemaInit,
               entered_from: &[S::Init, S::MainDbBackedUp],
               started: None,
               result: S::ShardSchemaCreated },
   PlanEntry { kind: OperationKind::CopyData,
               entered_from: &[S::ShardSchemaCreated, S::DataCopyStarted],
               started: Some(S::DataCopyStarted),
               result: S::DataCopied },
   PlanEntry { kind: OperationKind::CreateShardSchemaFull,
               entered_from: &[S::DataCopied],
               started: None,
               result: S::ShardSchemaFull },
   PlanEntry { kind: OperationKind::UpdateSecondaryIndex,
               entered_from: &[S::ShardSchemaFull, S::SecondaryIndexStarted],
               started: Some(S::SecondaryIndexStarted),
               result: S::SecondaryIndexUpdated },
   PlanEntry { kind: OperationKind::CsvExport,
               entered_from: &[S::SecondaryIndexUpdated, S::CsvExportStarted],
               started: Some(S::CsvExportStarted),
               result: S::CsvExported },
   PlanEntry { kind: OperationKind::ZipArchive,
               entered_from: &[S::CsvExported, S::ZipArchiveStarted],
               started: Some(S::ZipArchiveStarted),
               result: S::ZipArchived },
   PlanEntry { kind: OperationKind::DeleteCopiedData,
               entered_from: &[S::ZipArchived, S::DataRemoveStarted],
               started: Some(S::DataRemoveStarted),
               result: S::DataRemoved },
   PlanEntry { kind: OperationKind::FinishSharding,
               entered_from: &[S::DataRemoved],
               started: None,
               result: S::Completed }];

/// Pasos pendientes desde `state`. Con respaldo deshabilitado el paso de
/// backup se omite y el esquema inicial arranca desde `Init`.
pub fn remaining_plan(state: MigrateState, backup_db: bool) -> Result<Vec<PlanEntry>> {
  if state.is_terminal() {
    return Err(MigrationError::Configuration(format!("no hay pasos pendientes desde {}", state)));
  }
  let entries: Vec<PlanEntry> =
    MIGRATION_PLAN.iter().filter(|e| backup_db || e.kind != OperationKind::BackupDb).copied().collect();
  let start = entries.iter()
                     .position(|e| e.entered_from.contains(&state))
                     .ok_or_else(|| MigrationError::Configuration(format!("checkpoint no soportado: {}", state)))?;
  Ok(entries[start..].to_vec())
}

pub fn create_operation(kind: OperationKind) -> Box<dyn MigrationOperation> {
  match kind {
    OperationKind::BackupDb => Box::new(BackupDbBeforeShard),
    OperationKind::CreateShardSchemaInit => Box::new(CreateShardSchema::new(ShardSchemaVersion::Init)),
    OperationKind::CopyData => Box::new(CopyData),
    OperationKind::CreateShardSchemaFull => Box::new(CreateShardSchema::new(ShardSchemaVersion::Full)),
    OperationKind::UpdateSecondaryIndex => Box::new(UpdateSecondaryIndex),
    OperationKind::CsvExport => Box::new(CsvExport),
    OperationKind::ZipArchive => Box::new(ZipArchive),
    OperationKind::DeleteCopiedData => Box::new(DeleteCopiedData),
    OperationKind::FinishSharding => Box::new(FinishSharding),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plan_results_follow_state_order() {
    for pair in MIGRATION_PLAN.windows(2) {
      assert!(pair[0].result < pair[1].result);
      assert!(pair[1].entered_from.contains(&pair[0].result));
    }
  }

  #[test]
  fn started_markers_match_operations() {
    for entry in MIGRATION_PLAN {
      let op = create_operation(entry.kind);
      assert_eq!(op.started_state(), entry.started, "{:?}", entry.kind);
      if let Some(marker) = entry.started {
        assert!(marker.is_started_marker());
        assert!(entry.entered_from.contains(&marker));
      }
    }
  }

  #[test]
  fn backup_is_skipped_when_disabled() {
    let with = remaining_plan(MigrateState::Init, true).unwrap();
    let without = remaining_plan(MigrateState::Init, false).unwrap();
    assert_eq!(with.len(), 9);
    assert_eq!(without.len(), 8);
    assert_eq!(without[0].kind, OperationKind::CreateShardSchemaInit);
  }
}
