// Archivo: archive.rs
// Propósito: empaquetar el directorio de export de un shard en un ZIP y
// calcular su digest.
use crate::errors::{MigrationError, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub trait ArchiveCompressor: Send + Sync {
  /// Comprime los archivos de `source_dir` en `archive_path`, reemplazando
  /// un archivo previo.
  fn compress(&self, source_dir: &Path, archive_path: &Path) -> Result<()>;
}

/// ZIP con deflate. Entradas ordenadas por nombre y fecha fija, así el
/// mismo export produce los mismos bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiveCompressor;

fn zip_err(e: zip::result::ZipError) -> MigrationError {
  MigrationError::Resource(format!("zip: {}", e))
}

impl ZipArchiveCompressor {
  fn write_archive(&self, source_dir: &Path, tmp: &Path) -> Result<usize> {
    let mut files: Vec<_> = fs::read_dir(source_dir)?.filter_map(|e| e.ok())
                                                     .map(|e| e.path())
                                                     .filter(|p| p.is_file())
                                                     .collect();
    files.sort();
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
                                              .last_modified_time(zip::DateTime::default());
    let mut zip = ZipWriter::new(File::create(tmp)?);
    for path in &files {
      let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
                                                            MigrationError::Resource(format!("nombre inválido: {}",
                                                                                             path.display()))
                                                          })?;
      zip.start_file(name, options).map_err(zip_err)?;
      io::copy(&mut File::open(path)?, &mut zip)?;
    }
    zip.finish().map_err(zip_err)?;
    Ok(files.len())
  }
}

impl ArchiveCompressor for ZipArchiveCompressor {
  fn compress(&self, source_dir: &Path, archive_path: &Path) -> Result<()> {
    if !source_dir.is_dir() {
      return Err(MigrationError::Resource(format!("directorio de export inexistente: {}", source_dir.display())));
    }
    if let Some(parent) = archive_path.parent() {
      fs::create_dir_all(parent)?;
    }
    let tmp = archive_path.with_extension("zip.tmp");
    match self.write_archive(source_dir, &tmp) {
      Ok(count) => {
        fs::rename(&tmp, archive_path)?;
        log::info!("archivo {} creado con {} entradas", archive_path.display(), count);
        Ok(())
      }
      Err(e) => {
        let _ = fs::remove_file(&tmp);
        Err(e)
      }
    }
  }
}

/// Digest blake3 del archivo.
pub fn file_digest(path: &Path) -> Result<Vec<u8>> {
  let mut hasher = blake3::Hasher::new();
  io::copy(&mut File::open(path)?, &mut hasher)?;
  Ok(hasher.finalize().as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_input_gives_same_archive_digest() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("export");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("b.csv"), "x\n1\n").unwrap();
    fs::write(src.join("a.csv"), "y\n2\n").unwrap();
    let first = dir.path().join("one.zip");
    let second = dir.path().join("two.zip");
    ZipArchiveCompressor.compress(&src, &first).unwrap();
    ZipArchiveCompressor.compress(&src, &second).unwrap();
    assert_eq!(file_digest(&first).unwrap(), file_digest(&second).unwrap());
    let archive = zip::ZipArchive::new(File::open(&first).unwrap()).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    assert_eq!(names.len(), 2);
    assert!(!dir.path().join("one.zip.tmp").exists());
  }

  #[test]
  fn missing_source_is_a_resource_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ZipArchiveCompressor.compress(&dir.path().join("nada"), &dir.path().join("x.zip")).unwrap_err();
    assert!(matches!(err, MigrationError::Resource(_)));
  }
}
