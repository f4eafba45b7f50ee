use crate::errors::Result;
use crate::step::{MigrationOperation, StepContext};
use crate::steps::{for_each_block_batch, for_each_transaction_batch};
use ledger_domain::LedgerTable;
use migration_flow::MigrateState;

/// Copia `block` y `transaction` del rango al shard. Retoma desde el mayor
/// `db_id` ya copiado, así repetir el paso no duplica filas.
#[derive(Debug, Default)]
pub struct CopyData;

impl MigrationOperation for CopyData {
  fn name(&self) -> &str {
    "CopyData"
  }

  fn started_state(&self) -> Option<MigrateState> {
    Some(MigrateState::DataCopyStarted)
  }

  fn execute(&self, ctx: &StepContext) -> Result<MigrateState> {
    let store = ctx.shard_store()?;
    let exclude = ctx.exclude_info()?;

    let after = store.max_db_id(LedgerTable::Block)?.unwrap_or(0);
    let mut blocks = 0usize;
    for_each_block_batch(ctx, after, |rows| {
      blocks += store.insert_blocks(&rows)?;
      log::debug!("shard {}: {} bloques copiados", ctx.shard_id, blocks);
      Ok(())
    })?;

    let after = store.max_db_id(LedgerTable::Transaction)?.unwrap_or(0);
    let mut txs = 0usize;
    for_each_transaction_batch(ctx, after, |mut rows| {
      exclude.retain_allowed(&mut rows, |t| t.db_id);
      txs += store.insert_transactions(&rows)?;
      log::debug!("shard {}: {} transacciones copiadas", ctx.shard_id, txs);
      Ok(())
    })?;

    log::info!("shard {}: copia terminada ({} bloques, {} transacciones, {} excluidas)",
               ctx.shard_id,
               blocks,
               txs,
               exclude.len());
    Ok(MigrateState::DataCopied)
  }
}
