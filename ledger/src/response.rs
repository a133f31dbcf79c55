use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transaction_type::TransactionType;

/// Success body for `POST /transact`. Serialized verbatim into the
/// idempotency record on first execution, then replayed byte-for-byte on
/// every retry that shares the same `(key, user_id)` and payload hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactResponse {
    pub tx_id: String,
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub new_balance: i64,
    pub asset_type_id: i64,
    pub asset_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceView {
    pub user_id: String,
    pub balance: i64,
    pub asset_type_id: i64,
    pub asset_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub transaction_id: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub reason: TransactionType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryView {
    pub user_id: String,
    pub asset_code: String,
    pub asset_type_id: i64,
    pub current_balance: i64,
    pub transactions: Vec<HistoryEntry>,
}
