use crate::rows::{build_pool, map_db_err, BlockRow, DbConn, DbPool, NameRow, TransactionRow};
use crate::schema;
use diesel::dsl::{count_star, max};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use ledger_domain::{Block, DomainError, LedgerTable, ShardSchemaVersion, ShardStore, ShardStoreProvider, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

// Tablas sin restricciones: la copia masiva no paga índices.
const INIT_SCHEMA: [&str; 2] = ["CREATE TABLE IF NOT EXISTS block (db_id BIGINT NOT NULL, id BIGINT NOT NULL, height \
                                 INTEGER NOT NULL, version INTEGER NOT NULL, timestamp INTEGER NOT NULL, timeout \
                                 INTEGER NOT NULL, previous_block_id BIGINT NOT NULL, generator_id BIGINT NOT NULL, \
                                 block_signature BLOB NOT NULL, payload_hash BLOB NOT NULL)",
                                "CREATE TABLE IF NOT EXISTS \"transaction\" (db_id BIGINT NOT NULL, id BIGINT NOT \
                                 NULL, height INTEGER NOT NULL, block_id BIGINT NOT NULL, transaction_index SMALLINT \
                                 NOT NULL, full_hash BLOB NOT NULL, signature BLOB NOT NULL, attachment TEXT NOT \
                                 NULL)"];

const FULL_SCHEMA: [&str; 6] = ["CREATE UNIQUE INDEX IF NOT EXISTS block_db_id_idx ON block (db_id)",
                                "CREATE UNIQUE INDEX IF NOT EXISTS block_id_idx ON block (id)",
                                "CREATE INDEX IF NOT EXISTS block_height_idx ON block (height)",
                                "CREATE UNIQUE INDEX IF NOT EXISTS transaction_db_id_idx ON \"transaction\" (db_id)",
                                "CREATE UNIQUE INDEX IF NOT EXISTS transaction_id_idx ON \"transaction\" (id)",
                                "CREATE INDEX IF NOT EXISTS transaction_height_idx ON \"transaction\" (height)"];

/// Índice cuya presencia marca el esquema completo.
const FULL_SCHEMA_MARKER: &str = "block_db_id_idx";

/// Store de un shard: un archivo SQLite propio con pool de 2 conexiones.
pub struct DieselShardStore {
  shard_id: i64,
  path: PathBuf,
  pool: RwLock<Option<DbPool>>,
}

impl DieselShardStore {
  pub fn open(shard_id: i64, path: &Path) -> Result<Self, DomainError> {
    let url = path.to_string_lossy().to_string();
    let pool = build_pool(&url, 2)?;
    log::debug!("store de shard {} abierto en {}", shard_id, path.display());
    Ok(Self { shard_id,
              path: path.to_path_buf(),
              pool: RwLock::new(Some(pool)) })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn conn(&self) -> Result<DbConn, DomainError> {
    let guard = self.pool.read().unwrap_or_else(|e| e.into_inner());
    let pool = guard.as_ref()
                    .ok_or_else(|| DomainError::StorageError(format!("shard {} cerrado", self.shard_id)))?;
    pool.get().map_err(|e| DomainError::StorageError(format!("pool: {}", e)))
  }

  fn execute_ddl(&self, statements: &[&str]) -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     for ddl in statements {
                       diesel::sql_query(*ddl).execute(c)?;
                     }
                     Ok(())
                   }))
  }
}

impl ShardStore for DieselShardStore {
  fn shard_id(&self) -> i64 {
    self.shard_id
  }

  fn apply_schema(&self, version: ShardSchemaVersion) -> Result<(), DomainError> {
    self.execute_ddl(&INIT_SCHEMA)?;
    if version == ShardSchemaVersion::Full {
      self.execute_ddl(&FULL_SCHEMA)?;
    }
    log::debug!("esquema {} aplicado al shard {}", version, self.shard_id);
    Ok(())
  }

  fn schema_version(&self) -> Result<Option<ShardSchemaVersion>, DomainError> {
    let mut conn = self.conn()?;
    let names = map_db_err(diesel::sql_query("SELECT name FROM sqlite_master WHERE name IN ('block', ?)")
                             .bind::<diesel::sql_types::Text, _>(FULL_SCHEMA_MARKER)
                             .load::<NameRow>(&mut conn))?;
    if names.iter().any(|n| n.name == FULL_SCHEMA_MARKER) {
      Ok(Some(ShardSchemaVersion::Full))
    } else if names.iter().any(|n| n.name == "block") {
      Ok(Some(ShardSchemaVersion::Init))
    } else {
      Ok(None)
    }
  }

  fn max_db_id(&self, table: LedgerTable) -> Result<Option<i64>, DomainError> {
    let mut conn = self.conn()?;
    match table {
      LedgerTable::Block => {
        use schema::block::dsl as b;
        map_db_err(b::block.select(max(b::db_id)).first::<Option<i64>>(&mut conn))
      }
      LedgerTable::Transaction => {
        use schema::transaction::dsl as t;
        map_db_err(t::transaction.select(max(t::db_id)).first::<Option<i64>>(&mut conn))
      }
    }
  }

  fn insert_blocks(&self, rows: &[Block]) -> Result<usize, DomainError> {
    if rows.is_empty() {
      return Ok(0);
    }
    let rows: Vec<BlockRow> = rows.iter().map(BlockRow::from).collect();
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     diesel::insert_into(schema::block::table).values(&rows).execute(c)
                   }))
  }

  fn insert_transactions(&self, rows: &[Transaction]) -> Result<usize, DomainError> {
    if rows.is_empty() {
      return Ok(0);
    }
    let rows: Vec<TransactionRow> = rows.iter().map(TransactionRow::from).collect();
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     diesel::insert_into(schema::transaction::table).values(&rows).execute(c)
                   }))
  }

  fn count(&self, table: LedgerTable) -> Result<i64, DomainError> {
    let mut conn = self.conn()?;
    match table {
      LedgerTable::Block => map_db_err(schema::block::table.select(count_star()).first::<i64>(&mut conn)),
      LedgerTable::Transaction => map_db_err(schema::transaction::table.select(count_star()).first::<i64>(&mut conn)),
    }
  }

  fn blocks(&self) -> Result<Vec<Block>, DomainError> {
    use schema::block::dsl as b;
    let mut conn = self.conn()?;
    let rows = map_db_err(b::block.order(b::db_id.asc()).load::<BlockRow>(&mut conn))?;
    Ok(rows.into_iter().map(Block::from).collect())
  }

  fn transactions(&self) -> Result<Vec<Transaction>, DomainError> {
    use schema::transaction::dsl as t;
    let mut conn = self.conn()?;
    let rows = map_db_err(t::transaction.order(t::db_id.asc()).load::<TransactionRow>(&mut conn))?;
    Ok(rows.into_iter().map(Transaction::from).collect())
  }

  fn close(&self) {
    let mut guard = self.pool.write().unwrap_or_else(|e| e.into_inner());
    if guard.take().is_some() {
      log::debug!("store de shard {} cerrado", self.shard_id);
    }
  }

  fn is_closed(&self) -> bool {
    self.pool.read().unwrap_or_else(|e| e.into_inner()).is_none()
  }
}

/// Abre stores de shard como `<data_dir>/<nombre>.sqlite`.
pub struct SqliteShardStoreProvider {
  data_dir: PathBuf,
}

impl SqliteShardStoreProvider {
  pub fn new(data_dir: impl Into<PathBuf>) -> Self {
    Self { data_dir: data_dir.into() }
  }

  pub fn shard_file(&self, name: &str) -> PathBuf {
    self.data_dir.join(format!("{}.sqlite", name))
  }
}

impl ShardStoreProvider for SqliteShardStoreProvider {
  fn open(&self, shard_id: i64, name: &str) -> Result<Arc<dyn ShardStore>, DomainError> {
    std::fs::create_dir_all(&self.data_dir)?;
    let store = DieselShardStore::open(shard_id, &self.shard_file(name))?;
    Ok(Arc::new(store))
  }
}
