use crate::errors::Result;
use crate::step::{MigrationOperation, StepContext};
use ledger_domain::ShardState;
use migration_flow::MigrateState;

#[derive(Debug, Default)]
pub struct FinishSharding;

impl MigrationOperation for FinishSharding {
  fn name(&self) -> &str {
    "FinishSharding"
  }

  fn execute(&self, ctx: &StepContext) -> Result<MigrateState> {
    let mut shard = ctx.load_shard()?;
    shard.shard_state = ShardState::Full;
    ctx.save_shard(&shard)?;
    log::info!("shard {} terminado en altura {}", shard.shard_id, shard.shard_height);
    Ok(MigrateState::Completed)
  }
}
