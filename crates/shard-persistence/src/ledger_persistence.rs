use crate::rows::{build_pool, checked_table_name, map_db_err, BlockIndexRow, BlockRow, CountRow, DbConn, DbPool,
                  DerivedSqlRow, PhasingPollRow, ShardRow, TransactionIndexRow, TransactionRow};
use crate::schema;
use chrono::{DateTime, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_types::{BigInt, Bool, Integer, Text};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use ledger_domain::{Block, BlockIndex, DerivedRow, DomainError, LedgerStore, PhasingPoll, Shard, ShardRegistry,
                    ShardState, Transaction, TransactionIndex};
use migration_flow::{FlowError, MigrateState, MigrationRecord, MigrationStateRepository};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
/// URL por defecto: SQLite en memoria compartida.
pub const DEFAULT_DB_URL: &str = "file:apl-main?mode=memory&cache=shared";
// Límite de variables por sentencia en filtros `IN (...)`.
const IN_CHUNK: usize = 500;
/// Store principal sobre SQLite. Implementa `LedgerStore`, `ShardRegistry`
/// y `MigrationStateRepository` contra la misma base.
pub struct DieselLedgerStore {
  pool: Arc<DbPool>,
}
impl DieselLedgerStore {
  pub fn new(database_url: &str) -> Result<Self, DomainError> {
    let pool = build_pool(database_url, 4)?;
    let store = DieselLedgerStore { pool: Arc::new(pool) };
    {
      let mut c = store.conn()?;
      c.run_pending_migrations(MIGRATIONS)
       .map_err(|e| DomainError::StorageError(format!("migraciones: {}", e)))?;
    }
    log::debug!("store principal abierto en {}", database_url);
    Ok(store)
  }
  fn conn(&self) -> Result<DbConn, DomainError> {
    self.pool.get().map_err(|e| DomainError::StorageError(format!("pool: {}", e)))
  }
  fn flow_conn(&self) -> Result<DbConn, FlowError> {
    self.pool.get().map_err(|e| FlowError::Storage(format!("pool: {}", e)))
  }
  /// Carga bloques (siembra de datos y herramientas).
  pub fn insert_blocks(&self, blocks: &[Block]) -> Result<usize, DomainError> {
    if blocks.is_empty() {
      return Ok(0);
    }
    let rows: Vec<BlockRow> = blocks.iter().map(BlockRow::from).collect();
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     diesel::insert_into(schema::block::table).values(&rows).execute(c)
                   }))
  }
  pub fn insert_transactions(&self, txs: &[Transaction]) -> Result<usize, DomainError> {
    if txs.is_empty() {
      return Ok(0);
    }
    let rows: Vec<TransactionRow> = txs.iter().map(TransactionRow::from).collect();
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     diesel::insert_into(schema::transaction::table).values(&rows).execute(c)
                   }))
  }
  pub fn insert_phasing_polls(&self, polls: &[PhasingPoll]) -> Result<usize, DomainError> {
    let rows: Vec<PhasingPollRow> = polls.iter().map(PhasingPollRow::from).collect();
    let mut conn = self.conn()?;
    map_db_err(diesel::insert_into(schema::phasing_poll::table).values(&rows).execute(&mut conn))
  }
  /// Inserta (o reemplaza) filas en una tabla derivada.
  pub fn insert_derived_rows(&self, table: &str, rows: &[DerivedRow]) -> Result<usize, DomainError> {
    let table = checked_table_name(table)?;
    let sql = format!("INSERT OR REPLACE INTO {} (db_id, height, latest, payload) VALUES (?, ?, ?, ?)", table);
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     let mut n = 0;
                     for r in rows {
                       n += diesel::sql_query(&sql).bind::<BigInt, _>(r.db_id)
                                                   .bind::<Integer, _>(r.height)
                                                   .bind::<Bool, _>(r.latest)
                                                   .bind::<Text, _>(&r.payload)
                                                   .execute(c)?;
                     }
                     Ok(n)
                   }))
  }
  /// Cantidad de filas de una tabla del store principal.
  pub fn count_rows(&self, table: &str) -> Result<i64, DomainError> {
    let table = checked_table_name(table)?;
    let mut conn = self.conn()?;
    let row = map_db_err(diesel::sql_query(format!("SELECT COUNT(*) AS count FROM \"{}\"", table))
                           .get_result::<CountRow>(&mut conn))?;
    Ok(row.count)
  }
}
impl LedgerStore for DieselLedgerStore {
  fn blocks_after(&self, after_db_id: i64, from_height: i32, to_height: i32, limit: usize)
                  -> Result<Vec<Block>, DomainError> {
    use schema::block::dsl as b;
    let mut conn = self.conn()?;
    let rows = map_db_err(b::block.filter(b::db_id.gt(after_db_id))
                                  .filter(b::height.ge(from_height))
                                  .filter(b::height.lt(to_height))
                                  .order(b::db_id.asc())
                                  .limit(limit as i64)
                                  .load::<BlockRow>(&mut conn))?;
    Ok(rows.into_iter().map(Block::from).collect())
  }
  fn transactions_after(&self,
                        after_db_id: i64,
                        from_height: i32,
                        to_height: i32,
                        limit: usize)
                        -> Result<Vec<Transaction>, DomainError> {
    use schema::transaction::dsl as t;
    let mut conn = self.conn()?;
    let rows = map_db_err(t::transaction.filter(t::db_id.gt(after_db_id))
                                        .filter(t::height.ge(from_height))
                                        .filter(t::height.lt(to_height))
                                        .order(t::db_id.asc())
                                        .limit(limit as i64)
                                        .load::<TransactionRow>(&mut conn))?;
    Ok(rows.into_iter().map(Transaction::from).collect())
  }
  fn block_signatures(&self, from_height: i32, to_height: i32) -> Result<Vec<Vec<u8>>, DomainError> {
    use schema::block::dsl as b;
    let mut conn = self.conn()?;
    map_db_err(b::block.filter(b::height.ge(from_height))
                       .filter(b::height.lt(to_height))
                       .order(b::height.asc())
                       .select(b::block_signature)
                       .load::<Vec<u8>>(&mut conn))
  }
  fn blocks_before(&self, height: i32, count: usize) -> Result<Vec<Block>, DomainError> {
    use schema::block::dsl as b;
    let mut conn = self.conn()?;
    let rows = map_db_err(b::block.filter(b::height.lt(height))
                                  .order(b::height.desc())
                                  .limit(count as i64)
                                  .load::<BlockRow>(&mut conn))?;
    Ok(rows.into_iter().map(Block::from).collect())
  }
  fn unsettled_phased_db_ids(&self, from_height: i32, to_height: i32) -> Result<BTreeSet<i64>, DomainError> {
    use schema::phasing_poll::dsl as p;
    use schema::transaction::dsl as t;
    let mut conn = self.conn()?;
    let pending = map_db_err(p::phasing_poll.filter(p::height.lt(to_height))
                                            .filter(p::finish_height.ge(to_height))
                                            .select(p::transaction_id)
                                            .load::<i64>(&mut conn))?;
    let mut out = BTreeSet::new();
    for chunk in pending.chunks(IN_CHUNK) {
      let ids = map_db_err(t::transaction.filter(t::id.eq_any(chunk))
                                         .filter(t::height.ge(from_height))
                                         .filter(t::height.lt(to_height))
                                         .select(t::db_id)
                                         .load::<i64>(&mut conn))?;
      out.extend(ids);
    }
    Ok(out)
  }
  fn save_block_index(&self, rows: &[BlockIndex]) -> Result<usize, DomainError> {
    if rows.is_empty() {
      return Ok(0);
    }
    let rows: Vec<BlockIndexRow> = rows.iter().map(BlockIndexRow::from).collect();
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     diesel::insert_or_ignore_into(schema::block_index::table).values(&rows).execute(c)
                   }))
  }
  fn save_transaction_index(&self, rows: &[TransactionIndex]) -> Result<usize, DomainError> {
    if rows.is_empty() {
      return Ok(0);
    }
    let rows: Vec<TransactionIndexRow> = rows.iter().map(TransactionIndexRow::from).collect();
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     diesel::insert_or_ignore_into(schema::transaction_shard_index::table).values(&rows).execute(c)
                   }))
  }
  fn block_index_rows(&self, to_height: i32) -> Result<Vec<BlockIndex>, DomainError> {
    use schema::block_index::dsl as bi;
    let mut conn = self.conn()?;
    let rows = map_db_err(bi::block_index.filter(bi::block_height.lt(to_height))
                                         .order((bi::block_height.asc(), bi::block_id.asc()))
                                         .load::<BlockIndexRow>(&mut conn))?;
    Ok(rows.into_iter().map(BlockIndex::from).collect())
  }
  fn transaction_index_rows(&self, to_height: i32) -> Result<Vec<TransactionIndex>, DomainError> {
    use schema::transaction_shard_index::dsl as ti;
    let mut conn = self.conn()?;
    let rows = map_db_err(ti::transaction_shard_index.filter(ti::height.lt(to_height))
                                                     .order((ti::height.asc(),
                                                             ti::transaction_index.asc(),
                                                             ti::transaction_id.asc()))
                                                     .load::<TransactionIndexRow>(&mut conn))?;
    Ok(rows.into_iter().map(TransactionIndex::from).collect())
  }
  fn derived_rows(&self, table: &str, to_height: i32) -> Result<Vec<DerivedRow>, DomainError> {
    let table = checked_table_name(table)?;
    let mut conn = self.conn()?;
    let sql = format!("SELECT db_id, height, latest, payload FROM {} WHERE height < ? ORDER BY db_id", table);
    let rows = map_db_err(diesel::sql_query(sql).bind::<Integer, _>(to_height).load::<DerivedSqlRow>(&mut conn))?;
    Ok(rows.into_iter().map(DerivedRow::from).collect())
  }
  fn delete_blocks(&self, db_ids: &[i64]) -> Result<usize, DomainError> {
    use schema::block::dsl as b;
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     let mut n = 0;
                     for chunk in db_ids.chunks(IN_CHUNK) {
                       n += diesel::delete(b::block.filter(b::db_id.eq_any(chunk))).execute(c)?;
                     }
                     Ok(n)
                   }))
  }
  fn delete_transactions(&self, db_ids: &[i64]) -> Result<usize, DomainError> {
    use schema::transaction::dsl as t;
    let mut conn = self.conn()?;
    map_db_err(conn.transaction::<_, DieselError, _>(|c| {
                     let mut n = 0;
                     for chunk in db_ids.chunks(IN_CHUNK) {
                       n += diesel::delete(t::transaction.filter(t::db_id.eq_any(chunk))).execute(c)?;
                     }
                     Ok(n)
                   }))
  }
  fn backup(&self, target: &Path) -> Result<(), DomainError> {
    if let Some(parent) = target.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    if tmp.exists() {
      std::fs::remove_file(&tmp)?;
    }
    let escaped = tmp.to_string_lossy().replace('\'', "''");
    let mut conn = self.conn()?;
    if let Err(e) = diesel::sql_query(format!("VACUUM INTO '{}'", escaped)).execute(&mut conn) {
      let _ = std::fs::remove_file(&tmp);
      return Err(DomainError::ResourceError(format!("backup en {}: {}", target.display(), e)));
    }
    std::fs::rename(&tmp, target)?;
    log::info!("backup del store principal escrito en {}", target.display());
    Ok(())
  }
}
impl ShardRegistry for DieselLedgerStore {
  fn find_all_shard_ids(&self) -> Result<Vec<i64>, DomainError> {
    use schema::shard::dsl as s;
    let mut conn = self.conn()?;
    map_db_err(s::shard.select(s::shard_id).order(s::shard_id.asc()).load::<i64>(&mut conn))
  }
  fn get_shard(&self, shard_id: i64) -> Result<Option<Shard>, DomainError> {
    use schema::shard::dsl as s;
    let mut conn = self.conn()?;
    let row = map_db_err(s::shard.filter(s::shard_id.eq(shard_id)).first::<ShardRow>(&mut conn).optional())?;
    row.map(Shard::try_from).transpose()
  }
  fn save_shard(&self, shard: &Shard) -> Result<(), DomainError> {
    let row = ShardRow::from(shard);
    let mut conn = self.conn()?;
    map_db_err(diesel::replace_into(schema::shard::table).values(&row).execute(&mut conn))?;
    Ok(())
  }
  fn next_shard_id(&self) -> Result<i64, DomainError> {
    use schema::shard::dsl as s;
    let mut conn = self.conn()?;
    let current = map_db_err(s::shard.select(max(s::shard_id)).first::<Option<i64>>(&mut conn))?;
    Ok(current.map(|id| id + 1).unwrap_or(1))
  }
  fn last_completed_or_archived_shard(&self) -> Result<Option<Shard>, DomainError> {
    use schema::shard::dsl as s;
    let mut conn = self.conn()?;
    let done = [ShardState::Full.code(), ShardState::CreatedByArchive.code()];
    let row = map_db_err(s::shard.filter(s::shard_state.eq_any(done))
                                 .order(s::shard_height.desc())
                                 .first::<ShardRow>(&mut conn)
                                 .optional())?;
    row.map(Shard::try_from).transpose()
  }
  fn all_shards(&self) -> Result<Vec<Shard>, DomainError> {
    use schema::shard::dsl as s;
    let mut conn = self.conn()?;
    let rows = map_db_err(s::shard.order(s::shard_id.asc()).load::<ShardRow>(&mut conn))?;
    rows.into_iter().map(Shard::try_from).collect()
  }
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::migration_state)]
struct MigrationStateRow {
  pub shard_id: i64,
  pub target_height: i32,
  pub start_height: i32,
  pub checkpoint: String,
  pub status: String,
  pub failed_step: Option<String>,
  pub updated_at_ts: i64,
}
impl TryFrom<MigrationStateRow> for MigrationRecord {
  type Error = FlowError;
  fn try_from(r: MigrationStateRow) -> Result<Self, Self::Error> {
    let updated_at = DateTime::<Utc>::from_timestamp_millis(r.updated_at_ts)
      .ok_or_else(|| FlowError::Storage(format!("timestamp inválido: {}", r.updated_at_ts)))?;
    Ok(MigrationRecord { shard_id: r.shard_id,
                         target_height: r.target_height,
                         start_height: r.start_height,
                         checkpoint: r.checkpoint.parse::<MigrateState>()?,
                         status: r.status.parse::<MigrateState>()?,
                         failed_step: r.failed_step,
                         updated_at })
  }
}
fn map_flow_err<T>(res: std::result::Result<T, DieselError>) -> Result<T, FlowError> {
  res.map_err(|e| FlowError::Storage(format!("db: {}", e)))
}
impl MigrationStateRepository for DieselLedgerStore {
  fn load_latest(&self) -> migration_flow::Result<Option<MigrationRecord>> {
    use schema::migration_state::dsl as m;
    let mut conn = self.flow_conn()?;
    let row = map_flow_err(m::migration_state.order(m::shard_id.desc()).first::<MigrationStateRow>(&mut conn).optional())?;
    row.map(MigrationRecord::try_from).transpose()
  }
  fn load(&self, shard_id: i64) -> migration_flow::Result<Option<MigrationRecord>> {
    use schema::migration_state::dsl as m;
    let mut conn = self.flow_conn()?;
    let row = map_flow_err(m::migration_state.filter(m::shard_id.eq(shard_id))
                                             .first::<MigrationStateRow>(&mut conn)
                                             .optional())?;
    row.map(MigrationRecord::try_from).transpose()
  }
  fn save(&self, record: &MigrationRecord) -> migration_flow::Result<()> {
    let row = MigrationStateRow { shard_id: record.shard_id,
                                  target_height: record.target_height,
                                  start_height: record.start_height,
                                  checkpoint: record.checkpoint.as_str().to_string(),
                                  status: record.status.as_str().to_string(),
                                  failed_step: record.failed_step.clone(),
                                  updated_at_ts: record.updated_at.timestamp_millis() };
    let mut conn = self.flow_conn()?;
    map_flow_err(diesel::replace_into(schema::migration_state::table).values(&row).execute(&mut conn))?;
    Ok(())
  }
  fn all(&self) -> migration_flow::Result<Vec<MigrationRecord>> {
    use schema::migration_state::dsl as m;
    let mut conn = self.flow_conn()?;
    let rows = map_flow_err(m::migration_state.order(m::shard_id.asc()).load::<MigrationStateRow>(&mut conn))?;
    rows.into_iter().map(MigrationRecord::try_from).collect()
  }
}
/// Crea el store principal desde el entorno (`APL_DB_URL` o `DATABASE_URL`);
/// sin variables usa SQLite en memoria compartida.
pub fn new_from_env() -> Result<DieselLedgerStore, DomainError> {
  dotenvy::dotenv().ok();
  let url = std::env::var("APL_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                       .unwrap_or_else(|_| DEFAULT_DB_URL.into());
  DieselLedgerStore::new(&url)
}
