use crate::errors::Result;
use crate::step::StepContext;
use migration_flow::MigrateState;

/// Un paso de la migración de shard.
pub trait MigrationOperation: Send + Sync {
  /// Nombre del paso; es el que queda en `failed_step` si falla.
  fn name(&self) -> &str;

  /// Marcador que el ejecutor persiste antes de correr un paso largo.
  fn started_state(&self) -> Option<MigrateState> {
    None
  }

  /// Ejecuta el paso y devuelve el estado alcanzado. Debe poder repetirse
  /// sobre datos parcialmente procesados.
  fn execute(&self, ctx: &StepContext) -> Result<MigrateState>;
}
