use crate::errors::{MigrationError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ledger_domain::{CellValue, TableData};
use std::path::{Path, PathBuf};

/// Escribe el contenido de una tabla en un directorio de export.
pub trait TableExporter: Send + Sync {
  /// Devuelve la ruta del archivo escrito. Reescribir la misma tabla
  /// reemplaza el archivo anterior.
  fn export(&self, dir: &Path, data: &TableData) -> Result<PathBuf>;
}

/// Un archivo `<tabla>.csv` por tabla, con fila de cabecera. Los bytes van
/// en base64 y `Null` como campo vacío.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvTableExporter;

impl CsvTableExporter {
  pub fn cell_to_field(cell: &CellValue) -> String {
    match cell {
      CellValue::Bytes(b) => STANDARD.encode(b),
      other => other.to_string(),
    }
  }
}

impl TableExporter for CsvTableExporter {
  fn export(&self, dir: &Path, data: &TableData) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", data.table));
    let csv_err = |e: csv::Error| MigrationError::Resource(format!("csv {}: {}", data.table, e));
    let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
    writer.write_record(&data.columns).map_err(csv_err)?;
    for row in &data.rows {
      writer.write_record(row.iter().map(Self::cell_to_field)).map_err(csv_err)?;
    }
    writer.flush()?;
    log::debug!("exportadas {} filas de {} a {}", data.len(), data.table, path.display());
    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_header_and_base64_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = TableData::new("shard", &["shard_id", "shard_hash", "archive_hash"]);
    data.push_row(vec![CellValue::Int(1), CellValue::Bytes(vec![1, 2, 3]), CellValue::Null]);
    let path = CsvTableExporter.export(dir.path(), &data).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["shard_id,shard_hash,archive_hash", "1,AQID,"]);
  }
}
