//! shard-workflow: motor de migración de shards.
//!
//! Mueve el tramo viejo de la cadena (`[inicio, altura objetivo)`) del
//! store principal a un store de shard propio, lo certifica con un hash
//! encadenado, lo exporta a CSV, lo empaqueta en un ZIP y borra del store
//! principal lo ya copiado. Cada paso deja un checkpoint en
//! `migration_flow::MigrationStateRepository`; una ejecución interrumpida
//! continúa desde el último checkpoint.
//!
//! ```
//! use ledger_domain::DomainStubs;
//! use shard_workflow::{BlockchainConfig, HeightConfig, ShardingConfig, ShardingEngineFactory};
//! use std::sync::Arc;
//!
//! let dir = std::env::temp_dir().join(format!("apl-doc-{}", std::process::id()));
//! let config = ShardingConfig { data_dir: dir, ..ShardingConfig::default() };
//! let heights = BlockchainConfig::new(vec![HeightConfig::new(0, true, 100)]).unwrap();
//! let ledger = Arc::new(DomainStubs::sample_ledger(150, 1).unwrap());
//! let (engine, _) = ShardingEngineFactory::in_memory(config, heights, ledger);
//! let state = engine.executor.run(100).unwrap();
//! assert_eq!(state, migration_flow::MigrateState::Completed);
//! ```

pub mod archive;
pub mod boundary;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod export;
pub mod factory;
pub mod hash;
pub mod observer;
pub mod step;
pub mod steps;

pub use archive::{file_digest, ArchiveCompressor, ZipArchiveCompressor};
pub use boundary::BoundaryExtractor;
pub use catalog::ShardCatalog;
pub use config::{BlockchainConfig, HeightConfig, ShardingConfig, DEFAULT_CHAIN_ID};
pub use engine::executor::MigrationRun;
pub use engine::{create_operation, remaining_plan, MigrationExecutor, OperationKind, PlanEntry, MIGRATION_PLAN};
pub use errors::MigrationError;
pub use events::{MigrationEvent, MigrationNotifier};
pub use export::{CsvTableExporter, TableExporter};
pub use factory::{ShardingEngine, ShardingEngineFactory};
pub use hash::{chain, merkle_root, verify_chain, IntegrityHasher};
pub use observer::{is_shard_due, ShardObserver, TrimData};
pub use step::{MigrationOperation, MigrationServices, StepContext};
