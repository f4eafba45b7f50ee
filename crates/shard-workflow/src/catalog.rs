// Archivo: catalog.rs
// Propósito: catálogo de stores de shard abiertos. Cachea por id, abre bajo
// demanda y aplica el esquema pedido.
use crate::errors::{MigrationError, Result};
use dashmap::DashMap;
use ledger_domain::{ShardNameHelper, ShardRegistry, ShardSchemaVersion, ShardStore, ShardStoreProvider, TEMP_DB_IDENTITY};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct ShardCatalog {
  registry: Arc<dyn ShardRegistry>,
  provider: Arc<dyn ShardStoreProvider>,
  chain_id: Uuid,
  stores: DashMap<i64, Arc<dyn ShardStore>>,
  temp_name: Mutex<Option<String>>,
}

impl ShardCatalog {
  pub fn new(registry: Arc<dyn ShardRegistry>, provider: Arc<dyn ShardStoreProvider>, chain_id: Uuid) -> Self {
    Self { registry,
           provider,
           chain_id,
           stores: DashMap::new(),
           temp_name: Mutex::new(None) }
  }

  pub fn chain_id(&self) -> &Uuid {
    &self.chain_id
  }

  pub fn find_all_shards(&self) -> Result<Vec<i64>> {
    Ok(self.registry.find_all_shard_ids()?)
  }

  pub fn next_shard_id(&self) -> Result<i64> {
    Ok(self.registry.next_shard_id()?)
  }

  /// Store del shard `shard_id`, o del próximo id libre si es `None`. Se
  /// reabre si el cacheado fue cerrado.
  pub fn get_or_create_shard_store(&self, shard_id: Option<i64>) -> Result<Arc<dyn ShardStore>> {
    let id = match shard_id {
      Some(id) => id,
      None => self.next_shard_id()?,
    };
    if id <= 0 {
      return Err(MigrationError::Configuration(format!("id de shard inválido: {}", id)));
    }
    if let Some(cached) = self.stores.get(&id) {
      if !cached.is_closed() {
        return Ok(cached.value().clone());
      }
    }
    self.stores.remove_if(&id, |_, s| s.is_closed());
    let name = ShardNameHelper::shard_name(id, &self.chain_id)?;
    let entry = self.stores.entry(id).or_try_insert_with(|| {
                                         log::info!("abriendo store de shard {}", name);
                                         self.provider.open(id, &name)
                                       })?;
    Ok(entry.value().clone())
  }

  pub fn get_or_create_shard_store_with_schema(&self,
                                               shard_id: Option<i64>,
                                               version: ShardSchemaVersion)
                                               -> Result<Arc<dyn ShardStore>> {
    let store = self.get_or_create_shard_store(shard_id)?;
    store.apply_schema(version)?;
    Ok(store)
  }

  /// Store de un shard ya terminado o importado; `None` en otro caso.
  pub fn get_or_init_full_shard_store(&self, shard_id: i64) -> Result<Option<Arc<dyn ShardStore>>> {
    match self.registry.get_shard(shard_id)? {
      Some(shard) if shard.shard_state.is_completed_or_archived() => {
        self.get_or_create_shard_store(Some(shard_id)).map(Some)
      }
      _ => Ok(None),
    }
  }

  /// Store temporal bajo `TEMP_DB_IDENTITY`. No pasa por el registro.
  /// Pedirlo con otro nombre cierra el anterior y abre uno nuevo.
  pub fn create_temporary_store(&self, name: &str) -> Result<Arc<dyn ShardStore>> {
    let mut current = self.temp_name.lock().unwrap_or_else(|e| e.into_inner());
    if current.as_deref() != Some(name) {
      if let Some((_, old)) = self.stores.remove(&TEMP_DB_IDENTITY) {
        log::debug!("cerrando store temporal {:?} para abrir {}", current, name);
        old.close();
      }
    }
    self.stores.remove_if(&TEMP_DB_IDENTITY, |_, s| s.is_closed());
    let entry = self.stores
                    .entry(TEMP_DB_IDENTITY)
                    .or_try_insert_with(|| self.provider.open(TEMP_DB_IDENTITY, name))?;
    *current = Some(name.to_string());
    Ok(entry.value().clone())
  }

  pub fn get_shard_store(&self, shard_id: i64) -> Option<Arc<dyn ShardStore>> {
    self.stores.get(&shard_id).map(|s| s.value().clone()).filter(|s| !s.is_closed())
  }

  /// Stores de todos los shards terminados o importados, en orden de id.
  pub fn full_stores(&self) -> Result<Vec<Arc<dyn ShardStore>>> {
    let mut out = Vec::new();
    for id in self.find_all_shards()? {
      if let Some(store) = self.get_or_init_full_shard_store(id)? {
        out.push(store);
      }
    }
    Ok(out)
  }

  /// Cierra y olvida todos los stores abiertos.
  pub fn shutdown(&self) {
    for entry in self.stores.iter() {
      entry.value().close();
    }
    let count = self.stores.len();
    self.stores.clear();
    log::debug!("catálogo cerrado ({} stores)", count);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ledger_domain::{InMemoryLedgerStore, InMemoryShardStoreProvider, Shard, ShardState};

  fn catalog() -> (Arc<InMemoryLedgerStore>, Arc<InMemoryShardStoreProvider>, ShardCatalog) {
    let ledger = Arc::new(InMemoryLedgerStore::new());
    let provider = Arc::new(InMemoryShardStoreProvider::new());
    let catalog = ShardCatalog::new(ledger.clone(), provider.clone(), Uuid::nil());
    (ledger, provider, catalog)
  }

  #[test]
  fn stores_are_cached_until_shutdown() {
    let (_, provider, catalog) = catalog();
    let a = catalog.get_or_create_shard_store(Some(1)).unwrap();
    let b = catalog.get_or_create_shard_store(Some(1)).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(provider.opened_count(), 1);
    catalog.shutdown();
    assert!(a.is_closed());
    assert!(catalog.get_shard_store(1).is_none());
    catalog.get_or_create_shard_store(Some(1)).unwrap();
    assert_eq!(provider.opened_count(), 2);
  }

  #[test]
  fn non_positive_ids_are_configuration_errors() {
    let (_, _, catalog) = catalog();
    assert!(matches!(catalog.get_or_create_shard_store(Some(0)), Err(MigrationError::Configuration(_))));
    assert!(matches!(catalog.get_or_create_shard_store(Some(-5)), Err(MigrationError::Configuration(_))));
  }

  #[test]
  fn none_uses_next_shard_id() {
    let (ledger, _, catalog) = catalog();
    ledger.save_shard(&Shard::new(1, 100)).unwrap();
    let store = catalog.get_or_create_shard_store(None).unwrap();
    assert_eq!(store.shard_id(), 2);
  }

  #[test]
  fn full_stores_only_include_finished_shards() {
    let (ledger, _, catalog) = catalog();
    let mut done = Shard::new(1, 100);
    done.shard_state = ShardState::Full;
    ledger.save_shard(&done).unwrap();
    ledger.save_shard(&Shard::new(2, 200)).unwrap();
    let stores = catalog.full_stores().unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].shard_id(), 1);
    assert!(catalog.get_or_init_full_shard_store(2).unwrap().is_none());
  }

  #[test]
  fn temporary_store_uses_reserved_identity() {
    let (ledger, _, catalog) = catalog();
    let tmp = catalog.create_temporary_store("tmp").unwrap();
    assert_eq!(tmp.shard_id(), TEMP_DB_IDENTITY);
    assert!(ledger.find_all_shard_ids().unwrap().is_empty());
  }

  #[test]
  fn temporary_store_reopens_when_name_changes() {
    let (_, provider, catalog) = catalog();
    let a = catalog.create_temporary_store("tmp-a").unwrap();
    let again = catalog.create_temporary_store("tmp-a").unwrap();
    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(provider.opened_count(), 1);

    catalog.create_temporary_store("tmp-b").unwrap();
    assert_eq!(provider.opened_count(), 2);
    catalog.create_temporary_store("tmp-b").unwrap();
    assert_eq!(provider.opened_count(), 2);
  }
}
