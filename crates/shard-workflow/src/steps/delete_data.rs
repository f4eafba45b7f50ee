use crate::errors::Result;
use crate::step::{MigrationOperation, StepContext};
use crate::steps::{for_each_block_batch, for_each_transaction_batch};
use migration_flow::MigrateState;

/// Borra del store principal lo que ya vive en el shard. Primero
/// transacciones y después bloques, un commit por lote. Las transacciones
/// excluidas se quedan.
#[derive(Debug, Default)]
pub struct DeleteCopiedData;

impl MigrationOperation for DeleteCopiedData {
  fn name(&self) -> &str {
    "DeleteCopiedData"
  }

  fn started_state(&self) -> Option<MigrateState> {
    Some(MigrateState::DataRemoveStarted)
  }

  fn execute(&self, ctx: &StepContext) -> Result<MigrateState> {
    let ledger = &ctx.services.ledger;
    let exclude = ctx.exclude_info()?;

    let mut txs = 0usize;
    for_each_transaction_batch(ctx, 0, |rows| {
      let ids: Vec<i64> = rows.iter().map(|t| t.db_id).filter(|id| !exclude.contains(*id)).collect();
      if !ids.is_empty() {
        txs += ledger.delete_transactions(&ids)?;
      }
      Ok(())
    })?;

    let mut blocks = 0usize;
    for_each_block_batch(ctx, 0, |rows| {
      let ids: Vec<i64> = rows.iter().map(|b| b.db_id).collect();
      blocks += ledger.delete_blocks(&ids)?;
      log::debug!("shard {}: {} bloques borrados", ctx.shard_id, blocks);
      Ok(())
    })?;

    log::info!("shard {}: borrados {} bloques y {} transacciones del store principal",
               ctx.shard_id,
               blocks,
               txs);
    Ok(MigrateState::DataRemoved)
  }
}
