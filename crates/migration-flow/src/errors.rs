// Archivo: errors.rs
// Propósito: errores del seguimiento de progreso de migraciones y el alias
// Result<T> usado por las APIs del crate.
use thiserror::Error;
/// Errores del repositorio de estado de migración.
///
/// - `NotFound`: registro o estado inexistente.
/// - `Storage`: error al acceder al almacenamiento durable.
/// - `Other`: cualquier otro error.
#[derive(Error, Debug)]
pub enum FlowError {
  #[error("No encontrado: {0}")]
  NotFound(String),
  /// Error genérico de almacenamiento (BD, archivo, etc.).
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
  #[error("Otro: {0}")]
  Other(String),
}
/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, FlowError>;
