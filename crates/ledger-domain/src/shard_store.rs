// shard_store.rs
use crate::block::{Block, Transaction};
use crate::shard::{BLOCK_TABLE_NAME, TRANSACTION_TABLE_NAME};
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Versión de esquema aplicada a un store de shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardSchemaVersion {
  /// Tablas sin restricciones: la copia masiva es rápida.
  Init,
  /// Tablas con índices únicos sobre `db_id` e `id`.
  Full,
}

impl fmt::Display for ShardSchemaVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ShardSchemaVersion::Init => write!(f, "init"),
      ShardSchemaVersion::Full => write!(f, "full"),
    }
  }
}

/// Tablas que se copian del store principal a un shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerTable {
  Block,
  Transaction,
}

impl LedgerTable {
  pub fn name(&self) -> &'static str {
    match self {
      LedgerTable::Block => BLOCK_TABLE_NAME,
      LedgerTable::Transaction => TRANSACTION_TABLE_NAME,
    }
  }
}

/// Store de un shard: un archivo de base de datos propio por shard.
pub trait ShardStore: Send + Sync {
  fn shard_id(&self) -> i64;

  /// Crea (o completa) las tablas del shard. Aplicar dos veces la misma
  /// versión es inocuo.
  fn apply_schema(&self, version: ShardSchemaVersion) -> Result<(), DomainError>;

  fn schema_version(&self) -> Result<Option<ShardSchemaVersion>, DomainError>;

  /// Mayor `db_id` presente en la tabla, o `None` si está vacía.
  fn max_db_id(&self, table: LedgerTable) -> Result<Option<i64>, DomainError>;

  /// Inserta un lote en una sola transacción.
  fn insert_blocks(&self, rows: &[Block]) -> Result<usize, DomainError>;

  fn insert_transactions(&self, rows: &[Transaction]) -> Result<usize, DomainError>;

  fn count(&self, table: LedgerTable) -> Result<i64, DomainError>;

  fn blocks(&self) -> Result<Vec<Block>, DomainError>;

  fn transactions(&self) -> Result<Vec<Transaction>, DomainError>;

  /// Libera conexiones. Un `close` repetido no hace nada.
  fn close(&self);

  fn is_closed(&self) -> bool;
}

/// Abre stores de shard por identidad. Abrir el mismo id dos veces devuelve
/// el mismo almacenamiento subyacente.
pub trait ShardStoreProvider: Send + Sync {
  fn open(&self, shard_id: i64, name: &str) -> Result<Arc<dyn ShardStore>, DomainError>;
}

#[derive(Debug, Default)]
struct ShardTables {
  schema: Option<ShardSchemaVersion>,
  blocks: Vec<Block>,
  transactions: Vec<Transaction>,
}

/// Store de shard en memoria. Guarda las filas en vectores para que los
/// duplicados sean observables por las pruebas.
#[derive(Debug)]
pub struct InMemoryShardStore {
  shard_id: i64,
  tables: Mutex<ShardTables>,
  closed: AtomicBool,
}

impl InMemoryShardStore {
  pub fn new(shard_id: i64) -> Self {
    Self { shard_id,
           tables: Mutex::new(ShardTables::default()),
           closed: AtomicBool::new(false) }
  }

  fn lock(&self) -> Result<MutexGuard<'_, ShardTables>, DomainError> {
    if self.closed.load(Ordering::SeqCst) {
      return Err(DomainError::StorageError(format!("shard {} cerrado", self.shard_id)));
    }
    self.tables
        .lock()
        .map_err(|e| DomainError::StorageError(format!("Mutex poisoned: {}", e)))
  }

  fn reopen(&self) {
    self.closed.store(false, Ordering::SeqCst);
  }

  fn require_schema(tables: &ShardTables, shard_id: i64) -> Result<(), DomainError> {
    if tables.schema.is_none() {
      return Err(DomainError::StorageError(format!("shard {} sin esquema", shard_id)));
    }
    Ok(())
  }

  fn has_duplicates<I: Iterator<Item = i64>>(ids: I) -> bool {
    let mut seen = HashSet::new();
    ids.into_iter().any(|id| !seen.insert(id))
  }
}

impl ShardStore for InMemoryShardStore {
  fn shard_id(&self) -> i64 {
    self.shard_id
  }

  fn apply_schema(&self, version: ShardSchemaVersion) -> Result<(), DomainError> {
    let mut tables = self.lock()?;
    if version == ShardSchemaVersion::Full
       && (Self::has_duplicates(tables.blocks.iter().map(|b| b.db_id))
           || Self::has_duplicates(tables.transactions.iter().map(|t| t.db_id)))
    {
      return Err(DomainError::StorageError(format!("UNIQUE constraint failed en shard {}", self.shard_id)));
    }
    // Full nunca retrocede a Init.
    if tables.schema != Some(ShardSchemaVersion::Full) {
      tables.schema = Some(version);
    }
    Ok(())
  }

  fn schema_version(&self) -> Result<Option<ShardSchemaVersion>, DomainError> {
    Ok(self.lock()?.schema)
  }

  fn max_db_id(&self, table: LedgerTable) -> Result<Option<i64>, DomainError> {
    let tables = self.lock()?;
    Ok(match table {
      LedgerTable::Block => tables.blocks.iter().map(|b| b.db_id).max(),
      LedgerTable::Transaction => tables.transactions.iter().map(|t| t.db_id).max(),
    })
  }

  fn insert_blocks(&self, rows: &[Block]) -> Result<usize, DomainError> {
    let mut tables = self.lock()?;
    Self::require_schema(&tables, self.shard_id)?;
    if tables.schema == Some(ShardSchemaVersion::Full) {
      let existing: HashSet<i64> = tables.blocks.iter().map(|b| b.db_id).collect();
      if rows.iter().any(|r| existing.contains(&r.db_id)) {
        return Err(DomainError::StorageError("UNIQUE constraint failed: block.db_id".to_string()));
      }
    }
    tables.blocks.extend_from_slice(rows);
    Ok(rows.len())
  }

  fn insert_transactions(&self, rows: &[Transaction]) -> Result<usize, DomainError> {
    let mut tables = self.lock()?;
    Self::require_schema(&tables, self.shard_id)?;
    if tables.schema == Some(ShardSchemaVersion::Full) {
      let existing: HashSet<i64> = tables.transactions.iter().map(|t| t.db_id).collect();
      if rows.iter().any(|r| existing.contains(&r.db_id)) {
        return Err(DomainError::StorageError("UNIQUE constraint failed: transaction.db_id".to_string()));
      }
    }
    tables.transactions.extend_from_slice(rows);
    Ok(rows.len())
  }

  fn count(&self, table: LedgerTable) -> Result<i64, DomainError> {
    let tables = self.lock()?;
    Ok(match table {
      LedgerTable::Block => tables.blocks.len() as i64,
      LedgerTable::Transaction => tables.transactions.len() as i64,
    })
  }

  fn blocks(&self) -> Result<Vec<Block>, DomainError> {
    let mut rows = self.lock()?.blocks.clone();
    rows.sort_by_key(|b| b.db_id);
    Ok(rows)
  }

  fn transactions(&self) -> Result<Vec<Transaction>, DomainError> {
    let mut rows = self.lock()?.transactions.clone();
    rows.sort_by_key(|t| t.db_id);
    Ok(rows)
  }

  fn close(&self) {
    self.closed.store(true, Ordering::SeqCst);
  }

  fn is_closed(&self) -> bool {
    self.closed.load(Ordering::SeqCst)
  }
}

/// Proveedor en memoria: conserva cada store abierto y lo reabre en vez de
/// crear uno nuevo.
#[derive(Debug, Default)]
pub struct InMemoryShardStoreProvider {
  stores: Mutex<HashMap<i64, Arc<InMemoryShardStore>>>,
  opened: AtomicUsize,
}

impl InMemoryShardStoreProvider {
  pub fn new() -> Self {
    Self::default()
  }

  /// Cantidad de llamadas a `open` recibidas.
  pub fn opened_count(&self) -> usize {
    self.opened.load(Ordering::SeqCst)
  }

  pub fn store(&self, shard_id: i64) -> Option<Arc<InMemoryShardStore>> {
    self.stores.lock().ok().and_then(|s| s.get(&shard_id).cloned())
  }
}

impl ShardStoreProvider for InMemoryShardStoreProvider {
  fn open(&self, shard_id: i64, name: &str) -> Result<Arc<dyn ShardStore>, DomainError> {
    let mut stores = self.stores
                         .lock()
                         .map_err(|e| DomainError::StorageError(format!("Mutex poisoned: {}", e)))?;
    self.opened.fetch_add(1, Ordering::SeqCst);
    log::debug!("abriendo store en memoria {} (shard {})", name, shard_id);
    let store = stores.entry(shard_id).or_insert_with(|| Arc::new(InMemoryShardStore::new(shard_id))).clone();
    store.reopen();
    Ok(store)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn block(db_id: i64) -> Block {
    Block { db_id,
            id: db_id * 10,
            height: db_id as i32,
            version: 1,
            timestamp: 0,
            timeout: 0,
            previous_block_id: 0,
            generator_id: 1,
            block_signature: vec![1],
            payload_hash: vec![2] }
  }

  #[test]
  fn inserts_require_schema_and_full_rejects_duplicates() {
    let store = InMemoryShardStore::new(1);
    assert!(store.insert_blocks(&[block(1)]).is_err());
    store.apply_schema(ShardSchemaVersion::Init).unwrap();
    store.insert_blocks(&[block(1), block(1)]).unwrap();
    assert!(store.apply_schema(ShardSchemaVersion::Full).is_err());
  }

  #[test]
  fn provider_reopens_same_store() {
    let provider = InMemoryShardStoreProvider::new();
    let a = provider.open(3, "a").unwrap();
    a.apply_schema(ShardSchemaVersion::Init).unwrap();
    a.close();
    let b = provider.open(3, "a").unwrap();
    assert!(!b.is_closed());
    assert_eq!(b.schema_version().unwrap(), Some(ShardSchemaVersion::Init));
    assert_eq!(provider.opened_count(), 2);
  }
}
