//! Crate `migration-flow`: seguimiento durable del avance de migraciones
//!
//! Define los estados ordenados de una migración (`MigrateState`), el
//! registro por shard (`MigrationRecord`), el contrato de persistencia
//! `MigrationStateRepository` y una implementación en memoria útil para
//! pruebas.
//!
//! Diseño resumido:
//! - El checkpoint sólo avanza; un fallo conserva el último checkpoint y
//!   una nueva ejecución reanuda desde allí.
//! - Los estados `*Started` se guardan antes de los pasos largos.
//!
//! Ejemplo rápido:
//! ```rust
//! use migration_flow::{InMemoryMigrationStateRepository, MigrateState, MigrationRecord, MigrationStateRepository};
//! let repo = InMemoryMigrationStateRepository::new();
//! let mut rec = MigrationRecord::new(1, 0, 2000);
//! rec.advance(MigrateState::ShardSchemaCreated);
//! repo.save(&rec).unwrap();
//! assert_eq!(repo.load_latest().unwrap().unwrap().checkpoint, MigrateState::ShardSchemaCreated);
//! ```
pub mod errors;
pub mod record;
pub mod repository;
pub mod state;
pub mod stubs;

pub use errors::*;
pub use record::*;
pub use repository::*;
pub use state::*;
pub use stubs::*;
