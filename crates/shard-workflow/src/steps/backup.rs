use crate::errors::Result;
use crate::step::{MigrationOperation, StepContext};
use migration_flow::MigrateState;

/// Respaldo del store principal antes de tocar datos.
#[derive(Debug, Default)]
pub struct BackupDbBeforeShard;

impl MigrationOperation for BackupDbBeforeShard {
  fn name(&self) -> &str {
    "BackupDbBeforeShard"
  }

  fn execute(&self, ctx: &StepContext) -> Result<MigrateState> {
    let path = ctx.services.config.backup_dir().join(format!("{}-before.sqlite", ctx.shard_name()?));
    ctx.services.ledger.backup(&path)?;
    log::info!("store principal respaldado en {}", path.display());
    Ok(MigrateState::MainDbBackedUp)
  }
}
