use crate::errors::{MigrationError, Result};
use crate::step::{MigrationOperation, StepContext};
use ledger_domain::{ShardSchemaVersion, ShardState};
use migration_flow::MigrateState;

/// Crea el esquema del shard. `Init` deja tablas sin restricciones para la
/// copia; `Full` agrega los índices únicos y certifica el shard con su
/// hash y los datos de los bloques previos.
#[derive(Debug)]
pub struct CreateShardSchema {
  version: ShardSchemaVersion,
  name: String,
}

impl CreateShardSchema {
  pub fn new(version: ShardSchemaVersion) -> Self {
    Self { version, name: format!("CreateShardSchema({})", version) }
  }

  pub fn version(&self) -> ShardSchemaVersion {
    self.version
  }

  fn create_init(&self, ctx: &StepContext) -> Result<MigrateState> {
    ctx.services
       .catalog
       .get_or_create_shard_store_with_schema(Some(ctx.shard_id), ShardSchemaVersion::Init)?;
    let mut shard = ctx.load_shard()?;
    shard.shard_height = ctx.target_height;
    shard.shard_state = ShardState::Init;
    ctx.save_shard(&shard)?;
    log::info!("esquema inicial del shard {} creado (corte {})", ctx.shard_id, ctx.target_height);
    Ok(MigrateState::ShardSchemaCreated)
  }

  fn create_full(&self, ctx: &StepContext) -> Result<MigrateState> {
    let hash = ctx.services.hasher.calculate_hash(ctx.start_height, ctx.target_height)?;
    if hash.is_empty() {
      return Err(MigrationError::Integrity(format!("hash vacío para el shard {}", ctx.shard_id)));
    }
    let prev = ctx.services
                  .boundary
                  .extract_prev_block_data(ctx.target_height, ctx.services.config.prev_block_window)?;
    ctx.services
       .catalog
       .get_or_create_shard_store_with_schema(Some(ctx.shard_id), ShardSchemaVersion::Full)?;
    let mut shard = ctx.load_shard()?.with_prev_block_data(&prev);
    shard.shard_height = ctx.target_height;
    shard.shard_hash = Some(hash);
    shard.shard_state = ShardState::InProgress;
    ctx.save_shard(&shard)?;
    log::info!("esquema completo del shard {} aplicado ({} bloques previos)", ctx.shard_id, prev.len());
    Ok(MigrateState::ShardSchemaFull)
  }
}

impl MigrationOperation for CreateShardSchema {
  fn name(&self) -> &str {
    &self.name
  }

  fn execute(&self, ctx: &StepContext) -> Result<MigrateState> {
    match self.version {
      ShardSchemaVersion::Init => self.create_init(ctx),
      ShardSchemaVersion::Full => self.create_full(ctx),
    }
  }
}
