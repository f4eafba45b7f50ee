use crate::errors::Result;
use crate::step::{MigrationOperation, StepContext};
use crate::steps::{for_each_block_batch, for_each_transaction_batch};
use ledger_domain::{BlockIndex, TransactionIndex};
use migration_flow::MigrateState;

/// Índices `block_index` y `transaction_shard_index` en el store principal
/// para ubicar filas que ya viven en el shard.
#[derive(Debug, Default)]
pub struct UpdateSecondaryIndex;

impl MigrationOperation for UpdateSecondaryIndex {
  fn name(&self) -> &str {
    "UpdateSecondaryIndex"
  }

  fn started_state(&self) -> Option<MigrateState> {
    Some(MigrateState::SecondaryIndexStarted)
  }

  fn execute(&self, ctx: &StepContext) -> Result<MigrateState> {
    let ledger = &ctx.services.ledger;
    let exclude = ctx.exclude_info()?;

    let mut blocks = 0usize;
    for_each_block_batch(ctx, 0, |rows| {
      let index: Vec<BlockIndex> =
        rows.iter().map(|b| BlockIndex { block_id: b.id, block_height: b.height }).collect();
      blocks += ledger.save_block_index(&index)?;
      Ok(())
    })?;

    let mut txs = 0usize;
    for_each_transaction_batch(ctx, 0, |mut rows| {
      exclude.retain_allowed(&mut rows, |t| t.db_id);
      let index: Vec<TransactionIndex> = rows.iter().map(TransactionIndex::from_transaction).collect();
      txs += ledger.save_transaction_index(&index)?;
      Ok(())
    })?;

    log::info!("shard {}: índices secundarios actualizados ({} bloques, {} transacciones nuevas)",
               ctx.shard_id,
               blocks,
               txs);
    Ok(MigrateState::SecondaryIndexUpdated)
  }
}
