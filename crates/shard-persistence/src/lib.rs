//! Persistencia SQLite (Diesel + r2d2) del motor de sharding.
//! `ledger_persistence` implementa el store principal, el registro de shards
//! y el repositorio de progreso de migraciones sobre la misma base;
//! `shard_persistence` abre un archivo SQLite por shard.

mod ledger_persistence;
mod rows;
pub mod schema;
mod shard_persistence;

pub use ledger_persistence::{new_from_env, DieselLedgerStore, DEFAULT_DB_URL, MIGRATIONS};
pub use shard_persistence::{DieselShardStore, SqliteShardStoreProvider};
