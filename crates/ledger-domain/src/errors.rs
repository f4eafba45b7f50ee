// errors.rs
use thiserror::Error;

/// Errores del dominio del ledger y de sus colaboradores de almacenamiento.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
  /// Entrada inválida (por ejemplo un `shard_id` nulo o no positivo).
  #[error("Error de validación: {0}")]
  ValidationError(String),
  /// Fallo de lectura/escritura contra un store (principal o shard).
  #[error("Error de almacenamiento: {0}")]
  StorageError(String),
  /// Fallo de sistema de archivos, compresión o export.
  #[error("Error de recurso: {0}")]
  ResourceError(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}

impl From<std::io::Error> for DomainError {
  fn from(e: std::io::Error) -> Self {
    Self::ResourceError(e.to_string())
  }
}
