use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite primary key `(key, user_id)`. At most one record can exist per
/// key-user pair; the database's unique constraint on the pair is the source
/// of truth for that invariant, not any in-process check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub user_id: String,
    pub request_hash: String,
    pub response_payload: String,
    pub created_at: DateTime<Utc>,
}
