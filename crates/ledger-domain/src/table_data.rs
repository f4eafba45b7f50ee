// table_data.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Valor de una celda exportable. Los bytes se mantienen crudos; la
/// codificación textual la decide el exportador.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellValue {
  Null,
  Int(i64),
  Bool(bool),
  Text(String),
  Bytes(Vec<u8>),
}

impl fmt::Display for CellValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CellValue::Null => write!(f, ""),
      CellValue::Int(v) => write!(f, "{}", v),
      CellValue::Bool(v) => write!(f, "{}", v),
      CellValue::Text(v) => write!(f, "{}", v),
      CellValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
    }
  }
}

/// Contenido tabular de una tabla lista para exportar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
  pub table: String,
  pub columns: Vec<String>,
  pub rows: Vec<Vec<CellValue>>,
}

impl TableData {
  pub fn new(table: &str, columns: &[&str]) -> Self {
    Self { table: table.to_string(), columns: columns.iter().map(|c| c.to_string()).collect(), rows: Vec::new() }
  }

  pub fn push_row(&mut self, row: Vec<CellValue>) {
    debug_assert_eq!(row.len(), self.columns.len(), "row width mismatch for {}", self.table);
    self.rows.push(row);
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }
}
