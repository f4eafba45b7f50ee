// Archivo: repository.rs
// Propósito: contrato de persistencia del progreso de migraciones.
use crate::errors::Result;
use crate::record::MigrationRecord;

/// Repositorio del progreso de migración. Cada `save` debe ser durable
/// antes de retornar: el ejecutor reanuda a partir de lo que aquí quede.
pub trait MigrationStateRepository: Send + Sync {
  /// Registro del shard con mayor id, si existe.
  fn load_latest(&self) -> Result<Option<MigrationRecord>>;

  fn load(&self, shard_id: i64) -> Result<Option<MigrationRecord>>;

  /// Inserta o reemplaza el registro del shard.
  fn save(&self, record: &MigrationRecord) -> Result<()>;

  /// Todos los registros en orden de shard.
  fn all(&self) -> Result<Vec<MigrationRecord>>;
}
