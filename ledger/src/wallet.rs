use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The reserved `user_id` denoting the treasury's counterparty wallet for
/// every asset type. Forbidden as a client-supplied `user_id`.
pub const SYSTEM_TREASURY: &str = "SYSTEM_TREASURY";

/// One row per `(user_id, asset_type_id)` pair.
///
/// `id` is the surrogate key used as the lock-ordering token: every
/// mutation acquires the two wallets it touches in ascending `id` order
/// (see [`crate::engine`]) so no two concurrent transactions can deadlock
/// over the same pair of rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: String,
    pub asset_type_id: i64,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}
