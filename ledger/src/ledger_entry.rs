use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transaction_type::TransactionType;

/// An immutable audit record. For any `transaction_id`, exactly two entries
/// exist — one per paired wallet — and their amounts sum to zero. Entries
/// are insert-only: never updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub transaction_id: String,
    pub wallet_id: i64,
    pub amount: i64,
    pub reason: TransactionType,
    pub created_at: DateTime<Utc>,
}
