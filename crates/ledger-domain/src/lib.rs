mod block;
mod derived_tables;
mod domain_stubs;
mod errors;
mod exclude_info;
mod ledger_store;
mod shard;
mod shard_name;
mod shard_store;
mod table_data;

pub use block::{Block, BlockIndex, DerivedRow, PhasingPoll, Transaction, TransactionIndex};
pub use derived_tables::{DerivedTablesRegistry, DEFAULT_DERIVED_TABLES};
pub use domain_stubs::{DomainStubs, STUB_BLOCK_ID_BASE, STUB_TRANSACTION_ID_BASE};
pub use errors::DomainError;
pub use exclude_info::{ExcludeInfo, PrevBlockData, PrevBlockEntry};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore, ShardRegistry};
pub use shard::{join_numbers, split_numbers, Shard, ShardState, ACCOUNT_LEDGER_TABLE_NAME, BLOCK_INDEX_TABLE_NAME,
                BLOCK_TABLE_NAME, DEFAULT_COMMIT_BATCH_SIZE, SHARD_TABLE_NAME, TEMP_DB_IDENTITY,
                TRANSACTION_INDEX_TABLE_NAME, TRANSACTION_TABLE_NAME};
pub use shard_name::ShardNameHelper;
pub use shard_store::{InMemoryShardStore, InMemoryShardStoreProvider, LedgerTable, ShardSchemaVersion, ShardStore,
                      ShardStoreProvider};
// Filas tabulares genéricas usadas por el export
pub use table_data::{CellValue, TableData};
