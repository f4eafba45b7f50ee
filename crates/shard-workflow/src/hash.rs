// Archivo: hash.rs
// Propósito: hash de integridad de un shard. Raíz Merkle (SHA-256) sobre
// las firmas de bloque del rango, encadenada con el hash del shard previo.
use crate::errors::{MigrationError, Result};
use ledger_domain::{LedgerStore, ShardRegistry};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Clone)]
pub struct IntegrityHasher {
  ledger: Arc<dyn LedgerStore>,
  registry: Arc<dyn ShardRegistry>,
}

impl IntegrityHasher {
  pub fn new(ledger: Arc<dyn LedgerStore>, registry: Arc<dyn ShardRegistry>) -> Self {
    Self { ledger, registry }
  }

  /// Hash encadenado del rango `[from_height, to_height)`.
  ///
  /// Un rango vacío o un store ilegible es `MigrationError::Integrity`.
  pub fn calculate_hash(&self, from_height: i32, to_height: i32) -> Result<Vec<u8>> {
    if from_height >= to_height {
      return Err(MigrationError::Integrity(format!("rango vacío [{}, {})", from_height, to_height)));
    }
    let signatures = self.ledger
                         .block_signatures(from_height, to_height)
                         .map_err(|e| MigrationError::Integrity(format!("no se pudieron leer firmas: {}", e)))?;
    if signatures.is_empty() {
      return Err(MigrationError::Integrity(format!("sin bloques en [{}, {})", from_height, to_height)));
    }
    let root = merkle_root(&signatures);
    let prev = self.registry
                   .last_completed_or_archived_shard()
                   .map_err(|e| MigrationError::Integrity(format!("no se pudo leer el shard previo: {}", e)))?
                   .and_then(|s| s.shard_hash);
    log::debug!("hash de [{}, {}) sobre {} bloques (previo: {})",
                from_height,
                to_height,
                signatures.len(),
                prev.is_some());
    Ok(chain(prev.as_deref(), &root))
  }
}

/// Raíz Merkle SHA-256. Un nodo impar se empareja consigo mismo. Las hojas
/// se hashean en paralelo conservando el orden.
pub fn merkle_root(leaves: &[Vec<u8>]) -> Vec<u8> {
  let mut level: Vec<Vec<u8>> = leaves.par_iter().map(|leaf| Sha256::digest(leaf).to_vec()).collect();
  while level.len() > 1 {
    level = level.par_chunks(2)
                 .map(|pair| {
                   let left = &pair[0];
                   let right = pair.get(1).unwrap_or(left);
                   let mut h = Sha256::new();
                   h.update(left);
                   h.update(right);
                   h.finalize().to_vec()
                 })
                 .collect();
  }
  level.into_iter().next().unwrap_or_default()
}

/// `SHA-256(prev || root)`; sin shard previo devuelve la raíz.
pub fn chain(prev: Option<&[u8]>, root: &[u8]) -> Vec<u8> {
  match prev {
    None => root.to_vec(),
    Some(p) => {
      let mut h = Sha256::new();
      h.update(p);
      h.update(root);
      h.finalize().to_vec()
    }
  }
}

/// Recalcula la cadena a partir de las raíces y la compara con los hashes
/// registrados, en orden. Detecta alteraciones y reordenamientos.
pub fn verify_chain(shard_hashes: &[Vec<u8>], roots: &[Vec<u8>]) -> bool {
  if shard_hashes.len() != roots.len() {
    return false;
  }
  let mut prev: Option<&[u8]> = None;
  for (hash, root) in shard_hashes.iter().zip(roots) {
    if chain(prev, root) != *hash {
      return false;
    }
    prev = Some(hash);
  }
  true
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sha(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
  }

  #[test]
  fn odd_leaf_is_paired_with_itself() {
    let leaves = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
    let (a, b, c) = (sha(b"a"), sha(b"b"), sha(b"c"));
    let ab = sha(&[a, b].concat());
    let cc = sha(&[c.clone(), c].concat());
    assert_eq!(merkle_root(&leaves), sha(&[ab, cc].concat()));
  }

  #[test]
  fn single_leaf_root_is_its_hash() {
    assert_eq!(merkle_root(&[b"x".to_vec()]), sha(b"x"));
  }

  #[test]
  fn chain_detects_reordering() {
    let roots = vec![sha(b"r1"), sha(b"r2"), sha(b"r3")];
    let mut hashes = Vec::new();
    let mut prev: Option<Vec<u8>> = None;
    for r in &roots {
      let h = chain(prev.as_deref(), r);
      hashes.push(h.clone());
      prev = Some(h);
    }
    assert!(verify_chain(&hashes, &roots));
    let swapped = vec![roots[1].clone(), roots[0].clone(), roots[2].clone()];
    assert!(!verify_chain(&hashes, &swapped));
    let mut tampered = hashes.clone();
    tampered[2][0] ^= 0xff;
    assert!(!verify_chain(&tampered, &roots));
  }
}
