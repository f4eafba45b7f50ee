use ledger_domain::DomainError;
use migration_flow::FlowError;
use thiserror::Error;

// Errores del motor de migración de shards.
//
// `Step` envuelve el error original con el nombre del paso, el shard y la
// altura objetivo; lo agrega el ejecutor al fallar un paso.
#[derive(Error, Debug)]
pub enum MigrationError {
  /// Checkpoint no soportado, id de shard inválido o funcionalidad
  /// deshabilitada.
  #[error("Error de configuración: {0}")]
  Configuration(String),

  /// Fuente de hash vacía o ilegible.
  #[error("Error de integridad: {0}")]
  Integrity(String),

  /// Errores de lectura/escritura contra los stores.
  #[error("Error de almacenamiento: {0}")]
  Storage(String),

  /// Archivo, compresión o sistema de archivos.
  #[error("Error de recurso: {0}")]
  Resource(String),

  #[error("Paso '{step}' falló (shard {shard_id}, altura {height}): {source}")]
  Step {
    step: String,
    shard_id: i64,
    height: i32,
    #[source]
    source: Box<MigrationError>,
  },
}

impl MigrationError {
  pub fn step(step: &str, shard_id: i64, height: i32, source: MigrationError) -> Self {
    MigrationError::Step { step: step.to_string(), shard_id, height, source: Box::new(source) }
  }

  /// Error original, sin los envoltorios de paso.
  pub fn root(&self) -> &MigrationError {
    match self {
      MigrationError::Step { source, .. } => source.root(),
      other => other,
    }
  }
}

impl From<DomainError> for MigrationError {
  fn from(e: DomainError) -> Self {
    match e {
      DomainError::ValidationError(m) => MigrationError::Configuration(m),
      DomainError::StorageError(m) | DomainError::SerializationError(m) => MigrationError::Storage(m),
      DomainError::ResourceError(m) => MigrationError::Resource(m),
    }
  }
}

impl From<FlowError> for MigrationError {
  fn from(e: FlowError) -> Self {
    MigrationError::Storage(e.to_string())
  }
}

impl From<std::io::Error> for MigrationError {
  fn from(e: std::io::Error) -> Self {
    MigrationError::Resource(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
