// Archivo: state.rs
// Propósito: estados ordenados de una migración de shard.
use crate::errors::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Estado de una migración. El orden de declaración es el orden de avance;
/// `Failed` queda fuera de la secuencia y es absorbente dentro de una
/// ejecución.
///
/// Los estados `*Started` se registran antes de un paso largo para que un
/// corte a mitad de paso reanude ese mismo paso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MigrateState {
  Init,
  MainDbBackedUp,
  ShardSchemaCreated,
  DataCopyStarted,
  DataCopied,
  ShardSchemaFull,
  SecondaryIndexStarted,
  SecondaryIndexUpdated,
  CsvExportStarted,
  CsvExported,
  ZipArchiveStarted,
  ZipArchived,
  DataRemoveStarted,
  DataRemoved,
  Completed,
  Failed,
}

impl MigrateState {
  pub const ALL: [MigrateState; 16] = [MigrateState::Init,
                                       MigrateState::MainDbBackedUp,
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
                                       MigrateState::Completed,
                                       MigrateState::Failed];

  pub fn as_str(&self) -> &'static str {
    match self {
      MigrateState::Init => "INIT",
      MigrateState::MainDbBackedUp => "MAIN_DB_BACKUPED",
      MigrateState::ShardSchemaCreated => "SHARD_SCHEMA_CREATED",
      MigrateState::DataCopyStarted => "DATA_COPY_TO_SHARD_STARTED",
      MigrateState::DataCopied => "DATA_COPY_TO_SHARD_FINISHED",
      MigrateState::ShardSchemaFull => "SHARD_SCHEMA_FULL",
      MigrateState::SecondaryIndexStarted => "SECONDARY_INDEX_STARTED",
      MigrateState::SecondaryIndexUpdated => "SECONDARY_INDEX_FINISHED",
      MigrateState::CsvExportStarted => "CSV_EXPORT_STARTED",
      MigrateState::CsvExported => "CSV_EXPORT_FINISHED",
      MigrateState::ZipArchiveStarted => "ZIP_ARCHIVE_STARTED",
      MigrateState::ZipArchived => "ZIP_ARCHIVE_FINISHED",
      MigrateState::DataRemoveStarted => "DATA_REMOVE_STARTED",
      MigrateState::DataRemoved => "DATA_REMOVED_FROM_MAIN",
      MigrateState::Completed => "COMPLETED",
      MigrateState::Failed => "FAILED",
    }
  }

  /// `true` para los marcadores que se registran antes de un paso largo.
  pub fn is_started_marker(&self) -> bool {
    matches!(self,
             MigrateState::DataCopyStarted
             | MigrateState::SecondaryIndexStarted
             | MigrateState::CsvExportStarted
             | MigrateState::ZipArchiveStarted
             | MigrateState::DataRemoveStarted)
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, MigrateState::Completed | MigrateState::Failed)
  }
}

impl fmt::Display for MigrateState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for MigrateState {
  type Err = FlowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    MigrateState::ALL.iter()
                     .copied()
                     .find(|st| st.as_str() == s)
                     .ok_or_else(|| FlowError::NotFound(format!("estado de migración desconocido: {}", s)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn order_follows_declaration() {
    assert!(MigrateState::Init < MigrateState::MainDbBackedUp);
    assert!(MigrateState::DataCopyStarted < MigrateState::DataCopied);
    assert!(MigrateState::DataRemoved < MigrateState::Completed);
    let mut sorted = MigrateState::ALL.to_vec();
    sorted.sort();
    assert_eq!(sorted, MigrateState::ALL.to_vec());
  }

  #[test]
  fn names_parse_back() {
    for st in MigrateState::ALL {
      assert_eq!(st.as_str().parse::<MigrateState>().unwrap(), st);
    }
    assert!("SOMETHING_ELSE".parse::<MigrateState>().is_err());
  }
}
