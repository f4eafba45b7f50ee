// Archivo: engine_factory.rs
// Propósito: arma el motor de sharding con colaboradores explícitos, ya
// sea desde el entorno (SQLite) o en memoria para pruebas.
use crate::archive::{ArchiveCompressor, ZipArchiveCompressor};
use crate::catalog::ShardCatalog;
use crate::config::{BlockchainConfig, ShardingConfig};
use crate::engine::MigrationExecutor;
use crate::errors::Result;
use crate::events::MigrationNotifier;
use crate::export::{CsvTableExporter, TableExporter};
use crate::observer::ShardObserver;
use crate::step::MigrationServices;
use ledger_domain::{DerivedTablesRegistry, InMemoryLedgerStore, InMemoryShardStoreProvider, LedgerStore, ShardRegistry,
                    ShardStoreProvider};
use migration_flow::{InMemoryMigrationStateRepository, MigrationStateRepository};
use shard_persistence::{DieselLedgerStore, SqliteShardStoreProvider};
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;

/// Motor listo para usar.
pub struct ShardingEngine {
  pub executor: Arc<MigrationExecutor>,
  pub catalog: Arc<ShardCatalog>,
  pub ledger: Arc<dyn LedgerStore>,
  pub registry: Arc<dyn ShardRegistry>,
  pub states: Arc<dyn MigrationStateRepository>,
  pub config: ShardingConfig,
  pub blockchain_config: Arc<RwLock<BlockchainConfig>>,
}

impl ShardingEngine {
  /// Observador de trims que despacha sobre `runtime`.
  pub fn observer(&self, runtime: Handle) -> ShardObserver {
    ShardObserver::new(self.executor.clone(),
                       self.blockchain_config.clone(),
                       self.config.no_shard_create,
                       runtime)
  }
}

pub struct ShardingEngineFactory;

impl ShardingEngineFactory {
  /// Store principal según `APL_DB_URL`/`DATABASE_URL` y un archivo SQLite
  /// por shard bajo `APL_DATA_DIR`.
  pub fn from_env() -> Result<ShardingEngine> {
    let config = ShardingConfig::from_env()?;
    let blockchain_config = BlockchainConfig::from_env()?;
    let store = Arc::new(shard_persistence::new_from_env()?);
    let provider = Arc::new(SqliteShardStoreProvider::new(config.data_dir.clone()));
    Ok(Self::from_sqlite(config, blockchain_config, store, provider))
  }

  pub fn from_sqlite(config: ShardingConfig,
                     blockchain_config: BlockchainConfig,
                     store: Arc<DieselLedgerStore>,
                     provider: Arc<SqliteShardStoreProvider>)
                     -> ShardingEngine {
    Self::build(config, blockchain_config, store.clone(), store.clone(), store, provider)
  }

  /// Todo en memoria sobre `ledger`. Devuelve también el proveedor para
  /// inspeccionar los stores de shard.
  pub fn in_memory(config: ShardingConfig,
                   blockchain_config: BlockchainConfig,
                   ledger: Arc<InMemoryLedgerStore>)
                   -> (ShardingEngine, Arc<InMemoryShardStoreProvider>) {
    let provider = Arc::new(InMemoryShardStoreProvider::new());
    let states = Arc::new(InMemoryMigrationStateRepository::new());
    let engine = Self::build(config, blockchain_config, ledger.clone(), ledger, states, provider.clone());
    (engine, provider)
  }

  pub fn build(config: ShardingConfig,
               blockchain_config: BlockchainConfig,
               ledger: Arc<dyn LedgerStore>,
               registry: Arc<dyn ShardRegistry>,
               states: Arc<dyn MigrationStateRepository>,
               provider: Arc<dyn ShardStoreProvider>)
               -> ShardingEngine {
    let catalog = Arc::new(ShardCatalog::new(registry.clone(), provider, config.chain_id));
    let exporter: Arc<dyn TableExporter> = Arc::new(CsvTableExporter);
    let compressor: Arc<dyn ArchiveCompressor> = Arc::new(ZipArchiveCompressor);
    let services = Arc::new(MigrationServices::new(config.clone(),
                                                   ledger.clone(),
                                                   registry.clone(),
                                                   catalog.clone(),
                                                   Arc::new(DerivedTablesRegistry::with_default_tables()),
                                                   exporter,
                                                   compressor));
    let executor = Arc::new(MigrationExecutor::new(services, states.clone(), MigrationNotifier::default()));
    ShardingEngine { executor,
                     catalog,
                     ledger,
                     registry,
                     states,
                     config,
                     blockchain_config: Arc::new(RwLock::new(blockchain_config)) }
  }
}
