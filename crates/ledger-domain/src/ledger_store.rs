// ledger_store.rs
//
// Contratos del store principal (lecturas/escrituras acotadas por altura y
// `db_id`) y del registro de shards, más una implementación en memoria para
// pruebas y desarrollo.
use crate::block::{Block, BlockIndex, DerivedRow, PhasingPoll, Transaction, TransactionIndex};
use crate::shard::Shard;
use crate::DomainError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Operaciones del store principal que el motor de sharding necesita.
///
/// Los rangos de altura son siempre semiabiertos: `[from_height, to_height)`.
/// Cada método de escritura es una unidad transaccional propia.
pub trait LedgerStore: Send + Sync {
  /// Bloques con `db_id > after_db_id` dentro del rango, ordenados por
  /// `db_id`, como máximo `limit`.
  fn blocks_after(&self, after_db_id: i64, from_height: i32, to_height: i32, limit: usize)
                  -> Result<Vec<Block>, DomainError>;

  /// Igual que `blocks_after` para la tabla `transaction`.
  fn transactions_after(&self,
                        after_db_id: i64,
                        from_height: i32,
                        to_height: i32,
                        limit: usize)
                        -> Result<Vec<Transaction>, DomainError>;

  /// Firmas de bloque del rango en orden de altura.
  fn block_signatures(&self, from_height: i32, to_height: i32) -> Result<Vec<Vec<u8>>, DomainError>;

  /// Hasta `count` bloques con altura menor a `height`, del más nuevo al más
  /// viejo.
  fn blocks_before(&self, height: i32, count: usize) -> Result<Vec<Block>, DomainError>;

  /// `db_id` de las transacciones del rango referenciadas por polls de
  /// phasing que todavía no terminan en `to_height`.
  fn unsettled_phased_db_ids(&self, from_height: i32, to_height: i32) -> Result<BTreeSet<i64>, DomainError>;

  /// Inserta entradas de `block_index` ignorando las ya existentes.
  fn save_block_index(&self, rows: &[BlockIndex]) -> Result<usize, DomainError>;

  /// Inserta entradas de `transaction_shard_index` ignorando las existentes.
  fn save_transaction_index(&self, rows: &[TransactionIndex]) -> Result<usize, DomainError>;

  fn block_index_rows(&self, to_height: i32) -> Result<Vec<BlockIndex>, DomainError>;

  fn transaction_index_rows(&self, to_height: i32) -> Result<Vec<TransactionIndex>, DomainError>;

  /// Filas de una tabla derivada con altura menor a `to_height`.
  fn derived_rows(&self, table: &str, to_height: i32) -> Result<Vec<DerivedRow>, DomainError>;

  /// Borra bloques por `db_id` en una sola transacción.
  fn delete_blocks(&self, db_ids: &[i64]) -> Result<usize, DomainError>;

  /// Borra transacciones por `db_id` en una sola transacción.
  fn delete_transactions(&self, db_ids: &[i64]) -> Result<usize, DomainError>;

  /// Copia completa del store a `target`. Nunca deja una copia parcial.
  fn backup(&self, target: &Path) -> Result<(), DomainError>;
}

/// Registro durable de shards (tabla `shard` del store principal).
pub trait ShardRegistry: Send + Sync {
  /// Ids conocidos en orden ascendente.
  fn find_all_shard_ids(&self) -> Result<Vec<i64>, DomainError>;

  fn get_shard(&self, shard_id: i64) -> Result<Option<Shard>, DomainError>;

  /// Inserta o reemplaza el registro del shard.
  fn save_shard(&self, shard: &Shard) -> Result<(), DomainError>;

  /// Siguiente id libre: `max(shard_id) + 1`, o 1 si no hay shards.
  fn next_shard_id(&self) -> Result<i64, DomainError>;

  /// Último shard (por altura) en estado `Full` o `CreatedByArchive`.
  fn last_completed_or_archived_shard(&self) -> Result<Option<Shard>, DomainError>;

  fn all_shards(&self) -> Result<Vec<Shard>, DomainError>;
}

/// Store principal en memoria. No es durable; pensado para pruebas.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
  blocks: Mutex<BTreeMap<i64, Block>>,
  transactions: Mutex<BTreeMap<i64, Transaction>>,
  polls: Mutex<Vec<PhasingPoll>>,
  block_index: Mutex<BTreeMap<i64, BlockIndex>>,
  transaction_index: Mutex<BTreeMap<i64, TransactionIndex>>,
  derived: Mutex<HashMap<String, Vec<DerivedRow>>>,
  shards: Mutex<BTreeMap<i64, Shard>>,
  backups: Mutex<Vec<PathBuf>>,
  fail_reads: AtomicBool,
  fail_backup: AtomicBool,
}

impl InMemoryLedgerStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock_map<'a, T>(&'a self, m: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, DomainError> {
    m.lock()
     .map_err(|e| DomainError::StorageError(format!("Mutex '{}' poisoned: {}", name, e)))
  }

  fn check_readable(&self) -> Result<(), DomainError> {
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(DomainError::StorageError("store principal ilegible".to_string()));
    }
    Ok(())
  }

  /// Hace que todas las lecturas fallen (simula un store corrupto).
  pub fn set_unreadable(&self, unreadable: bool) {
    self.fail_reads.store(unreadable, Ordering::SeqCst);
  }

  /// Hace que `backup` falle.
  pub fn set_backup_failure(&self, fail: bool) {
    self.fail_backup.store(fail, Ordering::SeqCst);
  }

  pub fn insert_block(&self, block: Block) -> Result<(), DomainError> {
    self.lock_map(&self.blocks, "blocks")?.insert(block.db_id, block);
    Ok(())
  }

  pub fn insert_transaction(&self, tx: Transaction) -> Result<(), DomainError> {
    self.lock_map(&self.transactions, "transactions")?.insert(tx.db_id, tx);
    Ok(())
  }

  pub fn insert_phasing_poll(&self, poll: PhasingPoll) -> Result<(), DomainError> {
    self.lock_map(&self.polls, "polls")?.push(poll);
    Ok(())
  }

  pub fn insert_derived_row(&self, table: &str, row: DerivedRow) -> Result<(), DomainError> {
    self.lock_map(&self.derived, "derived")?.entry(table.to_string()).or_default().push(row);
    Ok(())
  }

  pub fn block_count(&self) -> usize {
    self.blocks.lock().map(|b| b.len()).unwrap_or(0)
  }

  pub fn transaction_db_ids(&self) -> Vec<i64> {
    self.transactions.lock().map(|t| t.keys().copied().collect()).unwrap_or_default()
  }

  pub fn backups(&self) -> Vec<PathBuf> {
    self.backups.lock().map(|b| b.clone()).unwrap_or_default()
  }
}

impl LedgerStore for InMemoryLedgerStore {
  fn blocks_after(&self, after_db_id: i64, from_height: i32, to_height: i32, limit: usize)
                  -> Result<Vec<Block>, DomainError> {
    self.check_readable()?;
    let blocks = self.lock_map(&self.blocks, "blocks")?;
    Ok(blocks.range(after_db_id.saturating_add(1)..)
             .map(|(_, b)| b)
             .filter(|b| b.height >= from_height && b.height < to_height)
             .take(limit)
             .cloned()
             .collect())
  }

  fn transactions_after(&self,
                        after_db_id: i64,
                        from_height: i32,
                        to_height: i32,
                        limit: usize)
                        -> Result<Vec<Transaction>, DomainError> {
    self.check_readable()?;
    let txs = self.lock_map(&self.transactions, "transactions")?;
    Ok(txs.range(after_db_id.saturating_add(1)..)
          .map(|(_, t)| t)
          .filter(|t| t.height >= from_height && t.height < to_height)
          .take(limit)
          .cloned()
          .collect())
  }

  fn block_signatures(&self, from_height: i32, to_height: i32) -> Result<Vec<Vec<u8>>, DomainError> {
    self.check_readable()?;
    let blocks = self.lock_map(&self.blocks, "blocks")?;
    let mut in_range: Vec<&Block> =
      blocks.values().filter(|b| b.height >= from_height && b.height < to_height).collect();
    in_range.sort_by_key(|b| b.height);
    Ok(in_range.into_iter().map(|b| b.block_signature.clone()).collect())
  }

  fn blocks_before(&self, height: i32, count: usize) -> Result<Vec<Block>, DomainError> {
    self.check_readable()?;
    let blocks = self.lock_map(&self.blocks, "blocks")?;
    let mut below: Vec<&Block> = blocks.values().filter(|b| b.height < height).collect();
    below.sort_by(|a, b| b.height.cmp(&a.height));
    Ok(below.into_iter().take(count).cloned().collect())
  }

  fn unsettled_phased_db_ids(&self, from_height: i32, to_height: i32) -> Result<BTreeSet<i64>, DomainError> {
    self.check_readable()?;
    let pending: BTreeSet<i64> = {
      let polls = self.lock_map(&self.polls, "polls")?;
      polls.iter()
           .filter(|p| p.height < to_height && p.finish_height >= to_height)
           .map(|p| p.transaction_id)
           .collect()
    };
    let txs = self.lock_map(&self.transactions, "transactions")?;
    Ok(txs.values()
          .filter(|t| t.height >= from_height && t.height < to_height && pending.contains(&t.id))
          .map(|t| t.db_id)
          .collect())
  }

  fn save_block_index(&self, rows: &[BlockIndex]) -> Result<usize, DomainError> {
    let mut index = self.lock_map(&self.block_index, "block_index")?;
    let mut inserted = 0;
    for row in rows {
      if !index.contains_key(&row.block_id) {
        index.insert(row.block_id, row.clone());
        inserted += 1;
      }
    }
    Ok(inserted)
  }

  fn save_transaction_index(&self, rows: &[TransactionIndex]) -> Result<usize, DomainError> {
    let mut index = self.lock_map(&self.transaction_index, "transaction_index")?;
    let mut inserted = 0;
    for row in rows {
      if !index.contains_key(&row.transaction_id) {
        index.insert(row.transaction_id, row.clone());
        inserted += 1;
      }
    }
    Ok(inserted)
  }

  fn block_index_rows(&self, to_height: i32) -> Result<Vec<BlockIndex>, DomainError> {
    self.check_readable()?;
    let index = self.lock_map(&self.block_index, "block_index")?;
    let mut rows: Vec<BlockIndex> = index.values().filter(|r| r.block_height < to_height).cloned().collect();
    rows.sort_by_key(|r| (r.block_height, r.block_id));
    Ok(rows)
  }

  fn transaction_index_rows(&self, to_height: i32) -> Result<Vec<TransactionIndex>, DomainError> {
    self.check_readable()?;
    let index = self.lock_map(&self.transaction_index, "transaction_index")?;
    let mut rows: Vec<TransactionIndex> = index.values().filter(|r| r.height < to_height).cloned().collect();
    rows.sort_by_key(|r| (r.height, r.transaction_index, r.transaction_id));
    Ok(rows)
  }

  fn derived_rows(&self, table: &str, to_height: i32) -> Result<Vec<DerivedRow>, DomainError> {
    self.check_readable()?;
    let derived = self.lock_map(&self.derived, "derived")?;
    let mut rows: Vec<DerivedRow> = derived.get(table)
                                           .map(|rows| rows.iter().filter(|r| r.height < to_height).cloned().collect())
                                           .unwrap_or_default();
    rows.sort_by_key(|r| r.db_id);
    Ok(rows)
  }

  fn delete_blocks(&self, db_ids: &[i64]) -> Result<usize, DomainError> {
    let mut blocks = self.lock_map(&self.blocks, "blocks")?;
    Ok(db_ids.iter().filter(|id| blocks.remove(id).is_some()).count())
  }

  fn delete_transactions(&self, db_ids: &[i64]) -> Result<usize, DomainError> {
    let mut txs = self.lock_map(&self.transactions, "transactions")?;
    Ok(db_ids.iter().filter(|id| txs.remove(id).is_some()).count())
  }

  fn backup(&self, target: &Path) -> Result<(), DomainError> {
    if self.fail_backup.load(Ordering::SeqCst) {
      return Err(DomainError::ResourceError(format!("no se pudo respaldar en {}", target.display())));
    }
    self.lock_map(&self.backups, "backups")?.push(target.to_path_buf());
    Ok(())
  }
}

impl ShardRegistry for InMemoryLedgerStore {
  fn find_all_shard_ids(&self) -> Result<Vec<i64>, DomainError> {
    Ok(self.lock_map(&self.shards, "shards")?.keys().copied().collect())
  }

  fn get_shard(&self, shard_id: i64) -> Result<Option<Shard>, DomainError> {
    Ok(self.lock_map(&self.shards, "shards")?.get(&shard_id).cloned())
  }

  fn save_shard(&self, shard: &Shard) -> Result<(), DomainError> {
    self.lock_map(&self.shards, "shards")?.insert(shard.shard_id, shard.clone());
    Ok(())
  }

  fn next_shard_id(&self) -> Result<i64, DomainError> {
    let shards = self.lock_map(&self.shards, "shards")?;
    Ok(shards.keys().next_back().map(|id| id + 1).unwrap_or(1))
  }

  fn last_completed_or_archived_shard(&self) -> Result<Option<Shard>, DomainError> {
    let shards = self.lock_map(&self.shards, "shards")?;
    Ok(shards.values()
             .filter(|s| s.shard_state.is_completed_or_archived())
             .max_by_key(|s| s.shard_height)
             .cloned())
  }

  fn all_shards(&self) -> Result<Vec<Shard>, DomainError> {
    Ok(self.lock_map(&self.shards, "shards")?.values().cloned().collect())
  }
}
