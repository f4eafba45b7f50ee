// shard_name.rs
use crate::DomainError;
use uuid::Uuid;

const SHARD_NAME_PREFIX: &str = "apl-blockchain-shard-";
const CHAIN_INFIX: &str = "-chain-";
const ARCHIVE_SUFFIX: &str = ".zip";

/// Genera los nombres deterministas de shards y de sus archivos.
///
/// El formato debe coincidir exactamente con los archivos ya publicados:
/// `apl-blockchain-shard-<id>-chain-<uuid>[.zip]`.
pub struct ShardNameHelper;

impl ShardNameHelper {
  pub fn shard_name(shard_id: impl Into<Option<i64>>, chain_id: &Uuid) -> Result<String, DomainError> {
    let id = Self::checked_id(shard_id.into())?;
    Ok(format!("{}{}{}{}", SHARD_NAME_PREFIX, id, CHAIN_INFIX, chain_id))
  }

  pub fn shard_archive_name(shard_id: impl Into<Option<i64>>, chain_id: &Uuid) -> Result<String, DomainError> {
    Ok(format!("{}{}", Self::shard_name(shard_id, chain_id)?, ARCHIVE_SUFFIX))
  }

  fn checked_id(shard_id: Option<i64>) -> Result<i64, DomainError> {
    match shard_id {
      None => Err(DomainError::ValidationError("shard_id no puede ser nulo".to_string())),
      Some(id) if id <= 0 => Err(DomainError::ValidationError(format!("shard_id debe ser positivo: {}", id))),
      Some(id) => Ok(id),
    }
  }
}
