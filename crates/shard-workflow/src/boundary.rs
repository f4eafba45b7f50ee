use crate::errors::Result;
use ledger_domain::{ExcludeInfo, LedgerStore, PrevBlockData, PrevBlockEntry};
use std::sync::Arc;

/// Calcula qué queda fuera del corte y qué datos de frontera acompañan al
/// shard.
#[derive(Clone)]
pub struct BoundaryExtractor {
  ledger: Arc<dyn LedgerStore>,
}

impl BoundaryExtractor {
  pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
    Self { ledger }
  }

  /// Transacciones de `[from_height, to_height)` referenciadas por polls de
  /// phasing que siguen abiertos en `to_height`. Sólo depende de filas bajo
  /// `to_height`, así que una ejecución reanudada obtiene el mismo conjunto.
  pub fn get_exclude_info(&self, from_height: i32, to_height: i32) -> Result<ExcludeInfo> {
    if from_height >= to_height {
      return Ok(ExcludeInfo::empty(from_height, to_height));
    }
    let db_ids = self.ledger.unsettled_phased_db_ids(from_height, to_height)?;
    if !db_ids.is_empty() {
      log::info!("{} transacciones excluidas del corte [{}, {})", db_ids.len(), from_height, to_height);
    }
    Ok(ExcludeInfo::new(from_height, to_height, db_ids))
  }

  /// Los `window` bloques inmediatamente anteriores a `height`, del más
  /// nuevo al más viejo.
  pub fn extract_prev_block_data(&self, height: i32, window: usize) -> Result<PrevBlockData> {
    if window == 0 || height <= 0 {
      return Ok(PrevBlockData::default());
    }
    let blocks = self.ledger.blocks_before(height, window)?;
    let blocks = blocks.into_iter()
                       .map(|b| PrevBlockEntry { block_id: b.id,
                                                 height: b.height,
                                                 generator_id: b.generator_id,
                                                 timestamp: b.timestamp,
                                                 timeout: b.timeout,
                                                 signature: b.block_signature })
                       .collect();
    Ok(PrevBlockData { blocks })
  }
}
