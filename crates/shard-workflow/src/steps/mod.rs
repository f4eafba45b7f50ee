// Archivo: steps/mod.rs
// Propósito: pasos concretos de la migración y recorridos por lotes
// compartidos entre ellos.
mod backup;
mod copy_data;
mod create_schema;
mod csv_export;
mod delete_data;
mod finish;
mod secondary_index;
mod zip_archive;

pub use backup::BackupDbBeforeShard;
pub use copy_data::CopyData;
pub use create_schema::CreateShardSchema;
pub use csv_export::{export_table_names, CsvExport};
pub use delete_data::DeleteCopiedData;
pub use finish::FinishSharding;
pub use secondary_index::UpdateSecondaryIndex;
pub use zip_archive::ZipArchive;

use crate::errors::Result;
use crate::step::StepContext;
use ledger_domain::{Block, Transaction};

/// Recorre los bloques del rango con `db_id > after` en lotes de
/// `commit_batch_size`, ordenados por `db_id`.
pub(crate) fn for_each_block_batch<F>(ctx: &StepContext, after: i64, mut f: F) -> Result<()>
  where F: FnMut(Vec<Block>) -> Result<()>
{
  let batch = ctx.batch_size();
  let mut cursor = after;
  loop {
    let rows = ctx.services.ledger.blocks_after(cursor, ctx.start_height, ctx.target_height, batch)?;
    let Some(last) = rows.last().map(|b| b.db_id) else {
      return Ok(());
    };
    cursor = last;
    let full = rows.len() == batch;
    f(rows)?;
    if !full {
      return Ok(());
    }
  }
}

/// Igual que `for_each_block_batch` para transacciones. El lote llega sin
/// filtrar; la exclusión la aplica quien llama.
pub(crate) fn for_each_transaction_batch<F>(ctx: &StepContext, after: i64, mut f: F) -> Result<()>
  where F: FnMut(Vec<Transaction>) -> Result<()>
{
  let batch = ctx.batch_size();
  let mut cursor = after;
  loop {
    let rows = ctx.services.ledger.transactions_after(cursor, ctx.start_height, ctx.target_height, batch)?;
    let Some(last) = rows.last().map(|t| t.db_id) else {
      return Ok(());
    };
    cursor = last;
    let full = rows.len() == batch;
    f(rows)?;
    if !full {
      return Ok(());
    }
  }
}
