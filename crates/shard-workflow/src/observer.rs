// Archivo: observer.rs
// Propósito: decide tras cada trim si corresponde crear un shard y despacha
// la migración al runtime sin bloquear a quien notifica.
use crate::config::BlockchainConfig;
use crate::engine::MigrationExecutor;
use migration_flow::MigrateState;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Aviso de trim terminado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimData {
  pub last_trim_height: i32,
  pub blockchain_height: i32,
}

impl TrimData {
  pub fn new(last_trim_height: i32, blockchain_height: i32) -> Self {
    Self { last_trim_height, blockchain_height }
  }
}

/// `true` si el trim en `last_trim_height` cae en un múltiplo de
/// `frequency` y la cadena no se alejó más de `frequency / 4` bloques.
pub fn is_shard_due(frequency: i32, last_trim_height: i32, blockchain_height: i32) -> bool {
  frequency > 0
  && last_trim_height != 0
  && last_trim_height % frequency == 0
  && blockchain_height - last_trim_height <= frequency / 4
}

pub struct ShardObserver {
  executor: Arc<MigrationExecutor>,
  blockchain_config: Arc<RwLock<BlockchainConfig>>,
  no_shard_create: bool,
  runtime: Handle,
  in_flight: Arc<Mutex<()>>,
}

impl ShardObserver {
  pub fn new(executor: Arc<MigrationExecutor>,
             blockchain_config: Arc<RwLock<BlockchainConfig>>,
             no_shard_create: bool,
             runtime: Handle)
             -> Self {
    Self { executor,
           blockchain_config,
           no_shard_create,
           runtime,
           in_flight: Arc::new(Mutex::new(())) }
  }

  pub fn on_trim_done(&self, trim: TrimData) -> Option<JoinHandle<MigrateState>> {
    self.try_create_shard_async(trim)
  }

  pub async fn on_trim_done_async(&self, trim: TrimData) -> Option<JoinHandle<MigrateState>> {
    self.try_create_shard_async(trim)
  }

  /// Aplica la política de disparo. Consume `just_updated` cuando el
  /// sharding está habilitado.
  pub fn should_create_shard(&self, trim: TrimData) -> bool {
    let mut cfg = self.blockchain_config.write().unwrap_or_else(|e| e.into_inner());
    if !cfg.current().sharding_enabled || self.no_shard_create {
      log::debug!("sharding deshabilitado en altura {}", trim.last_trim_height);
      return false;
    }
    let frequency = match cfg.previous() {
      Some(prev) if cfg.is_just_updated() && prev.sharding_enabled => prev.sharding_frequency,
      _ => cfg.current().sharding_frequency,
    };
    cfg.reset_just_updated();
    if frequency <= 0 {
      log::debug!("frecuencia de sharding {}: no se crea shard en este ciclo", frequency);
      return false;
    }
    let due = is_shard_due(frequency, trim.last_trim_height, trim.blockchain_height) && self.above_last_shard(trim);
    log::debug!("trim en {} (cadena {}), frecuencia {}: {}",
                trim.last_trim_height,
                trim.blockchain_height,
                frequency,
                if due { "crear shard" } else { "sin shard" });
    due
  }

  fn above_last_shard(&self, trim: TrimData) -> bool {
    match self.executor.last_shard_height() {
      Ok(height) if trim.last_trim_height <= height => {
        log::debug!("trim en {} ya cubierto por el shard en {}", trim.last_trim_height, height);
        false
      }
      Ok(_) => true,
      Err(e) => {
        log::warn!("no se pudo leer el último shard: {}", e);
        false
      }
    }
  }

  /// Lanza la migración hacia `last_trim_height` en un hilo bloqueante del
  /// runtime. `None` si no corresponde o si ya hay una en curso.
  pub fn try_create_shard_async(&self, trim: TrimData) -> Option<JoinHandle<MigrateState>> {
    if !self.should_create_shard(trim) {
      return None;
    }
    let permit = match self.in_flight.clone().try_lock_owned() {
      Ok(permit) => permit,
      Err(_) => {
        log::warn!("migración en curso; se ignora el trim en {}", trim.last_trim_height);
        return None;
      }
    };
    let executor = self.executor.clone();
    let target = trim.last_trim_height;
    log::info!("creando shard hasta la altura {}", target);
    Some(self.runtime.spawn_blocking(move || {
                       let _permit = permit;
                       match executor.run(target) {
                         Ok(state) => state,
                         Err(e) => {
                           log::warn!("migración hacia {} rechazada: {}", target, e);
                           MigrateState::Failed
                         }
                       }
                     }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn due_only_on_multiples_and_close_to_head() {
    assert!(is_shard_due(100, 200, 210));
    assert!(is_shard_due(100, 200, 225));
    assert!(!is_shard_due(100, 200, 226));
    assert!(!is_shard_due(100, 250, 250));
    assert!(!is_shard_due(100, 0, 10));
    assert!(!is_shard_due(0, 200, 200));
  }
}
