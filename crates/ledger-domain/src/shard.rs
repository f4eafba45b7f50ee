// shard.rs
use crate::exclude_info::PrevBlockData;
use crate::table_data::CellValue;
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identidad reservada para el store temporal; nunca se registra.
pub const TEMP_DB_IDENTITY: i64 = -1;

pub const BLOCK_TABLE_NAME: &str = "block";
pub const TRANSACTION_TABLE_NAME: &str = "transaction";
pub const BLOCK_INDEX_TABLE_NAME: &str = "block_index";
pub const TRANSACTION_INDEX_TABLE_NAME: &str = "transaction_shard_index";
pub const SHARD_TABLE_NAME: &str = "shard";
/// Tabla del ledger de cuentas: viva, nunca se exporta ni migra.
pub const ACCOUNT_LEDGER_TABLE_NAME: &str = "account_ledger";

/// Tamaño de lote por defecto para copias y borrados.
pub const DEFAULT_COMMIT_BATCH_SIZE: usize = 100;

/// Estado persistido de un shard en el registro del store principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardState {
  /// Esquema creado, sin datos certificados.
  Init,
  /// Restricciones, hash y PrevBlockData registrados.
  InProgress,
  /// Importado desde un archivo descargado de otro nodo.
  CreatedByArchive,
  /// Migración terminada.
  Full,
}

impl ShardState {
  pub fn code(&self) -> i32 {
    match self {
      ShardState::Init => 0,
      ShardState::InProgress => 1,
      ShardState::CreatedByArchive => 50,
      ShardState::Full => 100,
    }
  }

  pub fn from_code(code: i32) -> Result<Self, DomainError> {
    match code {
      0 => Ok(ShardState::Init),
      1 => Ok(ShardState::InProgress),
      50 => Ok(ShardState::CreatedByArchive),
      100 => Ok(ShardState::Full),
      other => Err(DomainError::ValidationError(format!("estado de shard desconocido: {}", other))),
    }
  }

  /// `true` para shards cuyos datos ya no viven en el store principal.
  pub fn is_completed_or_archived(&self) -> bool {
    matches!(self, ShardState::Full | ShardState::CreatedByArchive)
  }
}

impl fmt::Display for ShardState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ShardState::Init => "init",
      ShardState::InProgress => "in_progress",
      ShardState::CreatedByArchive => "created_by_archive",
      ShardState::Full => "full",
    };
    write!(f, "{}", s)
  }
}

/// Registro durable de un shard.
///
/// `shard_height` es la altura de corte: el shard contiene las alturas
/// `[inicio, shard_height)` y el store principal conserva desde
/// `shard_height` en adelante.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
  pub shard_id: i64,
  pub shard_height: i32,
  pub shard_hash: Option<Vec<u8>>,
  pub shard_state: ShardState,
  pub archive_hash: Option<Vec<u8>>,
  pub generator_ids: Vec<i64>,
  pub block_timeouts: Vec<i32>,
  pub block_timestamps: Vec<i32>,
}

impl Shard {
  pub const COLUMNS: [&'static str; 8] = ["shard_id",
                                          "shard_height",
                                          "shard_hash",
                                          "shard_state",
                                          "archive_hash",
                                          "generator_ids",
                                          "block_timeouts",
                                          "block_timestamps"];

  pub fn new(shard_id: i64, shard_height: i32) -> Self {
    Self { shard_id,
           shard_height,
           shard_hash: None,
           shard_state: ShardState::Init,
           archive_hash: None,
           generator_ids: Vec::new(),
           block_timeouts: Vec::new(),
           block_timestamps: Vec::new() }
  }

  pub fn with_prev_block_data(mut self, prev: &PrevBlockData) -> Self {
    self.generator_ids = prev.generator_ids();
    self.block_timeouts = prev.timeouts();
    self.block_timestamps = prev.timestamps();
    self
  }

  pub fn to_cells(&self) -> Vec<CellValue> {
    let bytes = |v: &Option<Vec<u8>>| v.clone().map(CellValue::Bytes).unwrap_or(CellValue::Null);
    vec![CellValue::Int(self.shard_id),
         CellValue::Int(self.shard_height as i64),
         bytes(&self.shard_hash),
         CellValue::Int(self.shard_state.code() as i64),
         bytes(&self.archive_hash),
         CellValue::Text(join_numbers(&self.generator_ids)),
         CellValue::Text(join_numbers(&self.block_timeouts)),
         CellValue::Text(join_numbers(&self.block_timestamps))]
  }
}

/// Serializa una lista numérica como `a,b,c` (formato de columnas de lista).
pub fn join_numbers<T: ToString>(values: &[T]) -> String {
  values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

/// Inverso de `join_numbers`. Una cadena vacía produce una lista vacía.
pub fn split_numbers<T: std::str::FromStr>(raw: &str) -> Result<Vec<T>, DomainError> {
  if raw.trim().is_empty() {
    return Ok(Vec::new());
  }
  raw.split(',')
     .map(|s| {
       s.trim()
        .parse::<T>()
        .map_err(|_| DomainError::SerializationError(format!("valor numérico inválido: '{}'", s)))
     })
     .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn state_codes_roundtrip_and_reject_unknown() {
    for s in [ShardState::Init, ShardState::InProgress, ShardState::CreatedByArchive, ShardState::Full] {
      assert_eq!(ShardState::from_code(s.code()).unwrap(), s);
    }
    assert!(ShardState::from_code(7).is_err());
  }

  #[test]
  fn number_lists_are_comma_separated() {
    assert_eq!(join_numbers(&[3i64, -2, 10]), "3,-2,10");
    assert_eq!(split_numbers::<i64>("3,-2,10").unwrap(), vec![3, -2, 10]);
    assert!(split_numbers::<i32>("").unwrap().is_empty());
    assert!(split_numbers::<i32>("1,x").is_err());
  }
}
