// block.rs
//
// Filas del store principal que el motor de sharding necesita conocer:
// bloques, transacciones, polls de phasing y los índices secundarios.
use crate::table_data::CellValue;
use serde::{Deserialize, Serialize};

/// Bloque tal como se guarda en la tabla `block`.
///
/// `db_id` es el identificador monotónico de fila usado como cursor por los
/// pasos de copia y borrado; `id` es la identidad lógica del bloque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
  pub db_id: i64,
  pub id: i64,
  pub height: i32,
  pub version: i32,
  pub timestamp: i32,
  pub timeout: i32,
  pub previous_block_id: i64,
  pub generator_id: i64,
  pub block_signature: Vec<u8>,
  pub payload_hash: Vec<u8>,
}

impl Block {
  pub const COLUMNS: [&'static str; 10] = ["db_id",
                                           "id",
                                           "height",
                                           "version",
                                           "timestamp",
                                           "timeout",
                                           "previous_block_id",
                                           "generator_id",
                                           "block_signature",
                                           "payload_hash"];

  pub fn to_cells(&self) -> Vec<CellValue> {
    vec![CellValue::Int(self.db_id),
         CellValue::Int(self.id),
         CellValue::Int(self.height as i64),
         CellValue::Int(self.version as i64),
         CellValue::Int(self.timestamp as i64),
         CellValue::Int(self.timeout as i64),
         CellValue::Int(self.previous_block_id),
         CellValue::Int(self.generator_id),
         CellValue::Bytes(self.block_signature.clone()),
         CellValue::Bytes(self.payload_hash.clone())]
  }
}

/// Transacción de la tabla `transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
  pub db_id: i64,
  pub id: i64,
  pub height: i32,
  pub block_id: i64,
  pub transaction_index: i16,
  pub full_hash: Vec<u8>,
  pub signature: Vec<u8>,
  /// Attachment serializado (JSON).
  pub attachment: String,
}

impl Transaction {
  pub const COLUMNS: [&'static str; 8] =
    ["db_id", "id", "height", "block_id", "transaction_index", "full_hash", "signature", "attachment"];

  /// Hash parcial usado por `transaction_shard_index`: el `full_hash` sin
  /// los primeros 8 bytes (que ya están codificados en el `id`).
  pub fn partial_hash(&self) -> Vec<u8> {
    self.full_hash.get(8..).map(|s| s.to_vec()).unwrap_or_default()
  }

  pub fn to_cells(&self) -> Vec<CellValue> {
    vec![CellValue::Int(self.db_id),
         CellValue::Int(self.id),
         CellValue::Int(self.height as i64),
         CellValue::Int(self.block_id),
         CellValue::Int(self.transaction_index as i64),
         CellValue::Bytes(self.full_hash.clone()),
         CellValue::Bytes(self.signature.clone()),
         CellValue::Text(self.attachment.clone())]
  }
}

/// Poll de phasing: mientras no llegue a `finish_height` la transacción
/// referenciada sigue viva y no puede salir del store principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasingPoll {
  pub db_id: i64,
  pub transaction_id: i64,
  pub height: i32,
  pub finish_height: i32,
}

/// Entrada de `block_index`: permite localizar en qué shard vive un bloque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndex {
  pub block_id: i64,
  pub block_height: i32,
}

impl BlockIndex {
  pub const COLUMNS: [&'static str; 2] = ["block_id", "block_height"];

  pub fn to_cells(&self) -> Vec<CellValue> {
    vec![CellValue::Int(self.block_id), CellValue::Int(self.block_height as i64)]
  }
}

/// Entrada de `transaction_shard_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIndex {
  pub transaction_id: i64,
  pub partial_transaction_hash: Vec<u8>,
  pub transaction_index: i16,
  pub height: i32,
}

impl TransactionIndex {
  pub const COLUMNS: [&'static str; 4] = ["transaction_id", "partial_transaction_hash", "transaction_index", "height"];

  pub fn from_transaction(tx: &Transaction) -> Self {
    Self { transaction_id: tx.id,
           partial_transaction_hash: tx.partial_hash(),
           transaction_index: tx.transaction_index,
           height: tx.height }
  }

  pub fn to_cells(&self) -> Vec<CellValue> {
    vec![CellValue::Int(self.transaction_id),
         CellValue::Bytes(self.partial_transaction_hash.clone()),
         CellValue::Int(self.transaction_index as i64),
         CellValue::Int(self.height as i64)]
  }
}

/// Fila de una tabla derivada. Todas las tablas derivadas comparten la
/// convención `db_id`, `height`, `latest`, `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRow {
  pub db_id: i64,
  pub height: i32,
  pub latest: bool,
  pub payload: String,
}

impl DerivedRow {
  pub const COLUMNS: [&'static str; 4] = ["db_id", "height", "latest", "payload"];

  pub fn to_cells(&self) -> Vec<CellValue> {
    vec![CellValue::Int(self.db_id),
         CellValue::Int(self.height as i64),
         CellValue::Bool(self.latest),
         CellValue::Text(self.payload.clone())]
  }
}
