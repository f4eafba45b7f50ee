use crate::block::{Block, DerivedRow, PhasingPoll, Transaction};
use crate::ledger_store::InMemoryLedgerStore;
use crate::DomainError;
use serde_json::json;

/// Identidad lógica del primer bloque generado por los stubs.
pub const STUB_BLOCK_ID_BASE: i64 = 1_000;
/// Identidad lógica de la primera transacción generada por los stubs.
pub const STUB_TRANSACTION_ID_BASE: i64 = 500_000;

pub struct DomainStubs;

impl DomainStubs {
  /// Bloque determinista para la altura dada. `db_id = height + 1`.
  pub fn block(height: i32) -> Block {
    let seed = height as u8;
    Block { db_id: height as i64 + 1,
            id: STUB_BLOCK_ID_BASE + height as i64,
            height,
            version: 3,
            timestamp: 1_000 + height * 10,
            timeout: height % 3,
            previous_block_id: if height == 0 { 0 } else { STUB_BLOCK_ID_BASE + height as i64 - 1 },
            generator_id: 7_000 + (height as i64 % 5),
            block_signature: (0..64u8).map(|i| seed.wrapping_mul(31).wrapping_add(i)).collect(),
            payload_hash: vec![seed; 32] }
  }

  /// Transacción determinista. `id = STUB_TRANSACTION_ID_BASE + db_id`.
  pub fn transaction(db_id: i64, height: i32, transaction_index: i16) -> Transaction {
    let seed = db_id as u8;
    Transaction { db_id,
                  id: STUB_TRANSACTION_ID_BASE + db_id,
                  height,
                  block_id: STUB_BLOCK_ID_BASE + height as i64,
                  transaction_index,
                  full_hash: (0..32u8).map(|i| seed.wrapping_add(i)).collect(),
                  signature: vec![seed; 64],
                  attachment: json!({"version.OrdinaryPayment": 0}).to_string() }
  }

  /// Store en memoria con `block_count` bloques (alturas `0..block_count`),
  /// `txs_per_block` transacciones por bloque y una fila por bloque en las
  /// tablas derivadas `account` y `account_ledger`.
  pub fn sample_ledger(block_count: i32, txs_per_block: usize) -> Result<InMemoryLedgerStore, DomainError> {
    let store = InMemoryLedgerStore::new();
    let mut tx_db_id = 0i64;
    for height in 0..block_count {
      store.insert_block(Self::block(height))?;
      for index in 0..txs_per_block {
        tx_db_id += 1;
        store.insert_transaction(Self::transaction(tx_db_id, height, index as i16))?;
      }
      let account = DerivedRow { db_id: height as i64 + 1,
                                 height,
                                 latest: true,
                                 payload: json!({"id": 7_000 + height, "balance": height * 100}).to_string() };
      store.insert_derived_row("account", account.clone())?;
      store.insert_derived_row("account_ledger", account)?;
    }
    Ok(store)
  }

  /// Registra un poll de phasing para la transacción `transaction_id`
  /// creado en `height` que termina en `finish_height`.
  pub fn phase_transaction(store: &InMemoryLedgerStore,
                           transaction_id: i64,
                           height: i32,
                           finish_height: i32)
                           -> Result<(), DomainError> {
    store.insert_phasing_poll(PhasingPoll { db_id: transaction_id, transaction_id, height, finish_height })
  }
}
