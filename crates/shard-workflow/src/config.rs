// Archivo: config.rs
// Propósito: configuración explícita del motor de sharding (sin holder
// global). Se lee del entorno con `dotenvy` igual que los repositorios.
use crate::errors::{MigrationError, Result};
use ledger_domain::DEFAULT_COMMIT_BATCH_SIZE;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Cadena usada cuando `APL_CHAIN_ID` no está definido.
pub static DEFAULT_CHAIN_ID: Lazy<Uuid> =
  Lazy::new(|| Uuid::from_u128(0xb5d7b697_f359_4ce5_a619_fa34b6fb01a5));

pub const DEFAULT_DATA_DIR: &str = "./apl-data";
pub const DEFAULT_SHARDING_FREQUENCY: i32 = 2000;
pub const DEFAULT_PREV_BLOCK_WINDOW: usize = 3;

/// Parámetros del motor que no dependen de la altura.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingConfig {
  pub data_dir: PathBuf,
  pub chain_id: Uuid,
  /// Override global: nunca crear shards.
  pub no_shard_create: bool,
  /// Respaldar el store principal antes de crear el shard.
  pub backup_db: bool,
  pub commit_batch_size: usize,
  pub prev_block_window: usize,
}

impl Default for ShardingConfig {
  fn default() -> Self {
    ShardingConfig { data_dir: PathBuf::from(DEFAULT_DATA_DIR),
                     chain_id: *DEFAULT_CHAIN_ID,
                     no_shard_create: false,
                     backup_db: false,
                     commit_batch_size: DEFAULT_COMMIT_BATCH_SIZE,
                     prev_block_window: DEFAULT_PREV_BLOCK_WINDOW }
  }
}

impl ShardingConfig {
  pub fn from_env() -> Result<Self> {
    dotenvy::dotenv().ok();
    let defaults = ShardingConfig::default();
    let data_dir = std::env::var("APL_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir);
    let chain_id = match std::env::var("APL_CHAIN_ID") {
      Ok(raw) => Uuid::parse_str(raw.trim())
                   .map_err(|e| MigrationError::Configuration(format!("APL_CHAIN_ID inválido: {}", e)))?,
      Err(_) => defaults.chain_id,
    };
    let commit_batch_size = env_parse("APL_SHARDING_COMMIT_BATCH", defaults.commit_batch_size)?;
    if commit_batch_size == 0 {
      return Err(MigrationError::Configuration("APL_SHARDING_COMMIT_BATCH debe ser > 0".into()));
    }
    Ok(ShardingConfig { data_dir,
                        chain_id,
                        no_shard_create: env_parse("APL_NO_SHARD_CREATE", defaults.no_shard_create)?,
                        backup_db: env_parse("APL_SHARDING_BACKUP_DB", defaults.backup_db)?,
                        commit_batch_size,
                        prev_block_window: defaults.prev_block_window })
  }

  pub fn backup_dir(&self) -> PathBuf {
    self.data_dir.join("backup")
  }

  pub fn export_dir(&self) -> PathBuf {
    self.data_dir.join("export")
  }
}

/// Perfil de configuración vigente desde `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightConfig {
  pub height: i32,
  pub sharding_enabled: bool,
  pub sharding_frequency: i32,
}

impl HeightConfig {
  pub fn new(height: i32, sharding_enabled: bool, sharding_frequency: i32) -> Self {
    Self { height, sharding_enabled, sharding_frequency }
  }
}

/// Perfiles por altura de la cadena. Al cambiar de perfil se conserva el
/// anterior y se marca `just_updated` hasta que el observador lo consume.
#[derive(Debug, Clone)]
pub struct BlockchainConfig {
  profiles: Vec<HeightConfig>,
  current: HeightConfig,
  previous: Option<HeightConfig>,
  just_updated: bool,
}

impl BlockchainConfig {
  pub fn new(mut profiles: Vec<HeightConfig>) -> Result<Self> {
    profiles.sort_by_key(|p| p.height);
    let current = *profiles.first()
                           .ok_or_else(|| MigrationError::Configuration("sin perfiles de altura".into()))?;
    Ok(Self { profiles, current, previous: None, just_updated: false })
  }

  /// Un único perfil desde la altura 0 con `APL_SHARDING_ENABLED` y
  /// `APL_SHARDING_FREQUENCY`.
  pub fn from_env() -> Result<Self> {
    dotenvy::dotenv().ok();
    let enabled = env_parse("APL_SHARDING_ENABLED", true)?;
    let frequency = env_parse("APL_SHARDING_FREQUENCY", DEFAULT_SHARDING_FREQUENCY)?;
    Self::new(vec![HeightConfig::new(0, enabled, frequency)])
  }

  /// Activa el perfil vigente en `height`. Devuelve `true` si cambió.
  pub fn update_to_height(&mut self, height: i32) -> bool {
    let target = self.profiles.iter().rev().find(|p| p.height <= height).copied().unwrap_or(self.profiles[0]);
    if target == self.current {
      return false;
    }
    self.previous = Some(self.current);
    self.current = target;
    self.just_updated = true;
    log::debug!("perfil de altura actualizado a {:?} (altura {})", target, height);
    true
  }

  pub fn current(&self) -> &HeightConfig {
    &self.current
  }

  pub fn previous(&self) -> Option<&HeightConfig> {
    self.previous.as_ref()
  }

  pub fn is_just_updated(&self) -> bool {
    self.just_updated
  }

  pub fn reset_just_updated(&mut self) {
    self.just_updated = false;
  }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T> {
  match std::env::var(name) {
    Ok(raw) => raw.trim()
                  .parse::<T>()
                  .map_err(|_| MigrationError::Configuration(format!("{} inválido: '{}'", name, raw))),
    Err(_) => Ok(default),
  }
}
