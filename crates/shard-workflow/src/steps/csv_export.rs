use crate::errors::Result;
use crate::step::{MigrationOperation, StepContext};
use crate::steps::{for_each_block_batch, for_each_transaction_batch};
use indexmap::IndexSet;
use ledger_domain::{Block, BlockIndex, DerivedRow, DerivedTablesRegistry, Shard, TableData, Transaction,
                    TransactionIndex, ACCOUNT_LEDGER_TABLE_NAME, BLOCK_INDEX_TABLE_NAME, BLOCK_TABLE_NAME,
                    SHARD_TABLE_NAME, TRANSACTION_INDEX_TABLE_NAME, TRANSACTION_TABLE_NAME};
use migration_flow::MigrateState;
use std::fs;

/// Tablas a exportar: las derivadas registradas (sin `account_ledger`)
/// seguidas de las tablas canónicas, sin repetir y en ese orden.
pub fn export_table_names(derived: &DerivedTablesRegistry) -> IndexSet<String> {
  let mut names: IndexSet<String> =
    derived.names().into_iter().filter(|n| n != ACCOUNT_LEDGER_TABLE_NAME).collect();
  for table in [BLOCK_TABLE_NAME,
                TRANSACTION_TABLE_NAME,
                BLOCK_INDEX_TABLE_NAME,
                TRANSACTION_INDEX_TABLE_NAME,
                SHARD_TABLE_NAME]
  {
    names.insert(table.to_string());
  }
  names
}

/// Exporta las tablas del shard a `<data_dir>/export/<shard>/`, un archivo
/// por tabla. El directorio se vacía antes de escribir.
#[derive(Debug, Default)]
pub struct CsvExport;

impl CsvExport {
  fn collect(&self, ctx: &StepContext, table: &str) -> Result<TableData> {
    let ledger = &ctx.services.ledger;
    let target = ctx.target_height;
    let data = match table {
      BLOCK_TABLE_NAME => {
        let mut data = TableData::new(table, &Block::COLUMNS);
        for_each_block_batch(ctx, 0, |rows| {
          rows.iter().for_each(|b| data.push_row(b.to_cells()));
          Ok(())
        })?;
        data
      }
      TRANSACTION_TABLE_NAME => {
        let exclude = ctx.exclude_info()?;
        let mut data = TableData::new(table, &Transaction::COLUMNS);
        for_each_transaction_batch(ctx, 0, |mut rows| {
          exclude.retain_allowed(&mut rows, |t| t.db_id);
          rows.iter().for_each(|t| data.push_row(t.to_cells()));
          Ok(())
        })?;
        data
      }
      BLOCK_INDEX_TABLE_NAME => {
        let mut data = TableData::new(table, &BlockIndex::COLUMNS);
        ledger.block_index_rows(target)?.iter().for_each(|r| data.push_row(r.to_cells()));
        data
      }
      TRANSACTION_INDEX_TABLE_NAME => {
        let mut data = TableData::new(table, &TransactionIndex::COLUMNS);
        ledger.transaction_index_rows(target)?.iter().for_each(|r| data.push_row(r.to_cells()));
        data
      }
      SHARD_TABLE_NAME => {
        let mut data = TableData::new(table, &Shard::COLUMNS);
        ctx.services.registry.all_shards()?.iter().for_each(|s| data.push_row(s.to_cells()));
        data
      }
      derived => {
        let mut data = TableData::new(derived, &DerivedRow::COLUMNS);
        ledger.derived_rows(derived, target)?.iter().for_each(|r| data.push_row(r.to_cells()));
        data
      }
    };
    Ok(data)
  }
}

impl MigrationOperation for CsvExport {
  fn name(&self) -> &str {
    "CsvExport"
  }

  fn started_state(&self) -> Option<MigrateState> {
    Some(MigrateState::CsvExportStarted)
  }

  fn execute(&self, ctx: &StepContext) -> Result<MigrateState> {
    let dir = ctx.export_dir()?;
    if dir.exists() {
      fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    let tables = export_table_names(&ctx.services.derived_tables);
    for table in &tables {
      let data = self.collect(ctx, table)?;
      ctx.services.exporter.export(&dir, &data)?;
    }
    log::info!("shard {}: {} tablas exportadas a {}", ctx.shard_id, tables.len(), dir.display());
    Ok(MigrateState::CsvExported)
  }
}
