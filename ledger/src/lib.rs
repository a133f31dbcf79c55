//! Double-entry ledger and idempotent transaction engine for a closed-loop
//! virtual-credit wallet. See [`engine::WalletAdapter`] for the storage
//! contract and [`adapters`] for the Postgres and in-memory backends.

pub mod adapters;
pub mod asset;
pub mod engine;
pub mod error;
pub mod idempotency;
pub mod ledger_entry;
pub mod request;
pub mod response;
pub mod transaction_type;
pub mod wallet;

pub use asset::{AssetType, require_asset_code};
pub use engine::{Engine, WalletAdapter};
pub use error::WalletError;
pub use idempotency::IdempotencyRecord;
pub use ledger_entry::LedgerEntry;
pub use request::{NormalizedRequest, RawTransactRequest};
pub use response::{BalanceView, HistoryEntry, HistoryView, TransactResponse};
pub use transaction_type::{Direction, TransactionType};
pub use wallet::{SYSTEM_TREASURY, Wallet};
