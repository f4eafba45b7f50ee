use crate::archive::ArchiveCompressor;
use crate::boundary::BoundaryExtractor;
use crate::catalog::ShardCatalog;
use crate::config::ShardingConfig;
use crate::errors::Result;
use crate::export::TableExporter;
use crate::hash::IntegrityHasher;
use ledger_domain::{DerivedTablesRegistry, ExcludeInfo, LedgerStore, Shard, ShardNameHelper, ShardRegistry, ShardStore};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;

/// Colaboradores compartidos por todas las ejecuciones.
pub struct MigrationServices {
  pub config: ShardingConfig,
  pub ledger: Arc<dyn LedgerStore>,
  pub registry: Arc<dyn ShardRegistry>,
  pub catalog: Arc<ShardCatalog>,
  pub hasher: IntegrityHasher,
  pub boundary: BoundaryExtractor,
  pub derived_tables: Arc<DerivedTablesRegistry>,
  pub exporter: Arc<dyn TableExporter>,
  pub compressor: Arc<dyn ArchiveCompressor>,
}

impl MigrationServices {
  pub fn new(config: ShardingConfig,
             ledger: Arc<dyn LedgerStore>,
             registry: Arc<dyn ShardRegistry>,
             catalog: Arc<ShardCatalog>,
             derived_tables: Arc<DerivedTablesRegistry>,
             exporter: Arc<dyn TableExporter>,
             compressor: Arc<dyn ArchiveCompressor>)
             -> Self {
    let hasher = IntegrityHasher::new(ledger.clone(), registry.clone());
    let boundary = BoundaryExtractor::new(ledger.clone());
    Self { config,
           ledger,
           registry,
           catalog,
           hasher,
           boundary,
           derived_tables,
           exporter,
           compressor }
  }
}

/// Contexto de una ejecución: shard, rango `[start_height, target_height)`
/// y la exclusión calculada una sola vez por ejecución.
pub struct StepContext {
  pub shard_id: i64,
  pub start_height: i32,
  pub target_height: i32,
  pub services: Arc<MigrationServices>,
  exclude_info: OnceCell<ExcludeInfo>,
}

impl StepContext {
  pub fn new(shard_id: i64, start_height: i32, target_height: i32, services: Arc<MigrationServices>) -> Self {
    Self { shard_id,
           start_height,
           target_height,
           services,
           exclude_info: OnceCell::new() }
  }

  pub fn exclude_info(&self) -> Result<&ExcludeInfo> {
    self.exclude_info
        .get_or_try_init(|| self.services.boundary.get_exclude_info(self.start_height, self.target_height))
  }

  pub fn batch_size(&self) -> usize {
    self.services.config.commit_batch_size.max(1)
  }

  pub fn shard_name(&self) -> Result<String> {
    Ok(ShardNameHelper::shard_name(self.shard_id, &self.services.config.chain_id)?)
  }

  pub fn archive_path(&self) -> Result<PathBuf> {
    let name = ShardNameHelper::shard_archive_name(self.shard_id, &self.services.config.chain_id)?;
    Ok(self.services.config.data_dir.join(name))
  }

  pub fn export_dir(&self) -> Result<PathBuf> {
    Ok(self.services.config.export_dir().join(self.shard_name()?))
  }

  pub fn shard_store(&self) -> Result<Arc<dyn ShardStore>> {
    self.services.catalog.get_or_create_shard_store(Some(self.shard_id))
  }

  /// Registro del shard en curso, o uno nuevo en estado `Init`.
  pub fn load_shard(&self) -> Result<Shard> {
    Ok(self.services
           .registry
           .get_shard(self.shard_id)?
           .unwrap_or_else(|| Shard::new(self.shard_id, self.target_height)))
  }

  pub fn save_shard(&self, shard: &Shard) -> Result<()> {
    Ok(self.services.registry.save_shard(shard)?)
  }
}
