// exclude_info.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Conjunto de `db_id` de transacciones que deben sobrevivir al corte
/// porque alguna funcionalidad viva aún las referencia.
///
/// Se calcula en cada ejecución para el rango `[from_height, to_height)` y
/// no se persiste junto al shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeInfo {
  pub from_height: i32,
  pub to_height: i32,
  db_ids: BTreeSet<i64>,
}

impl ExcludeInfo {
  pub fn new(from_height: i32, to_height: i32, db_ids: BTreeSet<i64>) -> Self {
    Self { from_height, to_height, db_ids }
  }

  pub fn empty(from_height: i32, to_height: i32) -> Self {
    Self::new(from_height, to_height, BTreeSet::new())
  }

  pub fn contains(&self, db_id: i64) -> bool {
    self.db_ids.contains(&db_id)
  }

  pub fn db_ids(&self) -> &BTreeSet<i64> {
    &self.db_ids
  }

  pub fn len(&self) -> usize {
    self.db_ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.db_ids.is_empty()
  }

  /// Descarta de `rows` las filas cuyo `db_id` está excluido.
  pub fn retain_allowed<T, F>(&self, rows: &mut Vec<T>, db_id: F)
    where F: Fn(&T) -> i64
  {
    if self.db_ids.is_empty() {
      return;
    }
    rows.retain(|r| !self.db_ids.contains(&db_id(r)));
  }
}

/// Metadatos de identidad de un bloque previo al corte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevBlockEntry {
  pub block_id: i64,
  pub height: i32,
  pub generator_id: i64,
  pub timestamp: i32,
  pub timeout: i32,
  pub signature: Vec<u8>,
}

/// Ventana acotada de bloques inmediatamente anteriores a la altura de
/// corte, ordenada del más nuevo al más viejo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevBlockData {
  pub blocks: Vec<PrevBlockEntry>,
}

impl PrevBlockData {
  pub fn generator_ids(&self) -> Vec<i64> {
    self.blocks.iter().map(|b| b.generator_id).collect()
  }

  pub fn timestamps(&self) -> Vec<i32> {
    self.blocks.iter().map(|b| b.timestamp).collect()
  }

  pub fn timeouts(&self) -> Vec<i32> {
    self.blocks.iter().map(|b| b.timeout).collect()
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }
}
