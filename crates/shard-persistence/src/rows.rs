// Filas Diesel compartidas por el store principal y los stores de shard.
use crate::schema;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel::sql_types::{BigInt, Bool, Integer, Text};
use ledger_domain::{join_numbers, split_numbers, Block, BlockIndex, DerivedRow, DomainError, PhasingPoll, Shard,
                    ShardState, Transaction, TransactionIndex};

pub(crate) type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub(crate) type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = schema::block)]
pub(crate) struct BlockRow {
  pub db_id: i64,
  pub id: i64,
  pub height: i32,
  pub version: i32,
  pub timestamp: i32,
  pub timeout: i32,
  pub previous_block_id: i64,
  pub generator_id: i64,
  pub block_signature: Vec<u8>,
  pub payload_hash: Vec<u8>,
}

impl From<&Block> for BlockRow {
  fn from(b: &Block) -> Self {
    Self { db_id: b.db_id,
           id: b.id,
           height: b.height,
           version: b.version,
           timestamp: b.timestamp,
           timeout: b.timeout,
           previous_block_id: b.previous_block_id,
           generator_id: b.generator_id,
           block_signature: b.block_signature.clone(),
           payload_hash: b.payload_hash.clone() }
  }
}

impl From<BlockRow> for Block {
  fn from(r: BlockRow) -> Self {
    Block { db_id: r.db_id,
            id: r.id,
            height: r.height,
            version: r.version,
            timestamp: r.timestamp,
            timeout: r.timeout,
            previous_block_id: r.previous_block_id,
            generator_id: r.generator_id,
            block_signature: r.block_signature,
            payload_hash: r.payload_hash }
  }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = schema::transaction)]
pub(crate) struct TransactionRow {
  pub db_id: i64,
  pub id: i64,
  pub height: i32,
  pub block_id: i64,
  pub transaction_index: i16,
  pub full_hash: Vec<u8>,
  pub signature: Vec<u8>,
  pub attachment: String,
}

impl From<&Transaction> for TransactionRow {
  fn from(t: &Transaction) -> Self {
    Self { db_id: t.db_id,
           id: t.id,
           height: t.height,
           block_id: t.block_id,
           transaction_index: t.transaction_index,
           full_hash: t.full_hash.clone(),
           signature: t.signature.clone(),
           attachment: t.attachment.clone() }
  }
}

impl From<TransactionRow> for Transaction {
  fn from(r: TransactionRow) -> Self {
    Transaction { db_id: r.db_id,
                  id: r.id,
                  height: r.height,
                  block_id: r.block_id,
                  transaction_index: r.transaction_index,
                  full_hash: r.full_hash,
                  signature: r.signature,
                  attachment: r.attachment }
  }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = schema::phasing_poll)]
pub(crate) struct PhasingPollRow {
  pub db_id: i64,
  pub transaction_id: i64,
  pub height: i32,
  pub finish_height: i32,
}

impl From<&PhasingPoll> for PhasingPollRow {
  fn from(p: &PhasingPoll) -> Self {
    Self { db_id: p.db_id, transaction_id: p.transaction_id, height: p.height, finish_height: p.finish_height }
  }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = schema::block_index)]
pub(crate) struct BlockIndexRow {
  pub block_id: i64,
  pub block_height: i32,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = schema::transaction_shard_index)]
pub(crate) struct TransactionIndexRow {
  pub transaction_id: i64,
  pub partial_transaction_hash: Vec<u8>,
  pub transaction_index: i16,
  pub height: i32,
}

impl From<&BlockIndex> for BlockIndexRow {
  fn from(b: &BlockIndex) -> Self {
    Self { block_id: b.block_id, block_height: b.block_height }
  }
}

impl From<BlockIndexRow> for BlockIndex {
  fn from(r: BlockIndexRow) -> Self {
    BlockIndex { block_id: r.block_id, block_height: r.block_height }
  }
}

impl From<&TransactionIndex> for TransactionIndexRow {
  fn from(t: &TransactionIndex) -> Self {
    Self { transaction_id: t.transaction_id,
           partial_transaction_hash: t.partial_transaction_hash.clone(),
           transaction_index: t.transaction_index,
           height: t.height }
  }
}

impl From<TransactionIndexRow> for TransactionIndex {
  fn from(r: TransactionIndexRow) -> Self {
    TransactionIndex { transaction_id: r.transaction_id,
                       partial_transaction_hash: r.partial_transaction_hash,
                       transaction_index: r.transaction_index,
                       height: r.height }
  }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = schema::shard)]
pub(crate) struct ShardRow {
  pub shard_id: i64,
  pub shard_height: i32,
  pub shard_hash: Option<Vec<u8>>,
  pub shard_state: i32,
  pub archive_hash: Option<Vec<u8>>,
  pub generator_ids: String,
  pub block_timeouts: String,
  pub block_timestamps: String,
}

impl From<&Shard> for ShardRow {
  fn from(s: &Shard) -> Self {
    Self { shard_id: s.shard_id,
           shard_height: s.shard_height,
           shard_hash: s.shard_hash.clone(),
           shard_state: s.shard_state.code(),
           archive_hash: s.archive_hash.clone(),
           generator_ids: join_numbers(&s.generator_ids),
           block_timeouts: join_numbers(&s.block_timeouts),
           block_timestamps: join_numbers(&s.block_timestamps) }
  }
}

impl TryFrom<ShardRow> for Shard {
  type Error = DomainError;

  fn try_from(r: ShardRow) -> Result<Self, Self::Error> {
    Ok(Shard { shard_id: r.shard_id,
               shard_height: r.shard_height,
               shard_hash: r.shard_hash,
               shard_state: ShardState::from_code(r.shard_state)?,
               archive_hash: r.archive_hash,
               generator_ids: split_numbers(&r.generator_ids)?,
               block_timeouts: split_numbers(&r.block_timeouts)?,
               block_timestamps: split_numbers(&r.block_timestamps)? })
  }
}

/// Fila de una tabla derivada leída con `sql_query` (el nombre de tabla es
/// dinámico).
#[derive(Debug, QueryableByName)]
pub(crate) struct DerivedSqlRow {
  #[diesel(sql_type = BigInt)]
  pub db_id: i64,
  #[diesel(sql_type = Integer)]
  pub height: i32,
  #[diesel(sql_type = Bool)]
  pub latest: bool,
  #[diesel(sql_type = Text)]
  pub payload: String,
}

impl From<DerivedSqlRow> for DerivedRow {
  fn from(r: DerivedSqlRow) -> Self {
    DerivedRow { db_id: r.db_id, height: r.height, latest: r.latest, payload: r.payload }
  }
}

#[derive(Debug, QueryableByName)]
pub(crate) struct CountRow {
  #[diesel(sql_type = BigInt)]
  pub count: i64,
}

#[derive(Debug, QueryableByName)]
pub(crate) struct NameRow {
  #[diesel(sql_type = Text)]
  pub name: String,
}

/// Aplica los PRAGMA en cada conexión que entrega el pool.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    // Las bases en memoria no admiten WAL; sqlite responde "memory" sin error.
    let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(conn);
    diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(conn).map_err(diesel::r2d2::Error::QueryError)?;
    Ok(())
  }
}

pub(crate) fn build_pool(database_url: &str, max_size: u32) -> Result<DbPool, DomainError> {
  let manager = ConnectionManager::<SqliteConnection>::new(database_url);
  Pool::builder().max_size(max_size)
                 .connection_customizer(Box::new(SqlitePragmas))
                 .build(manager)
                 .map_err(|e| DomainError::StorageError(format!("no se pudo crear el pool de conexiones: {}", e)))
}

pub(crate) fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T, DomainError> {
  res.map_err(|e| DomainError::StorageError(format!("db: {}", e)))
}

/// Nombres de tabla aceptados en SQL dinámico: `[a-z0-9_]`, no vacíos.
pub(crate) fn checked_table_name(table: &str) -> Result<&str, DomainError> {
  if !table.is_empty() && table.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
    Ok(table)
  } else {
    Err(DomainError::ValidationError(format!("nombre de tabla inválido: '{}'", table)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_names_are_sanitized() {
    assert!(checked_table_name("account_ledger").is_ok());
    assert!(checked_table_name("").is_err());
    assert!(checked_table_name("account; DROP TABLE block").is_err());
  }
}
