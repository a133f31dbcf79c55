use std::fmt;

/// Error taxonomy for the wallet engine.
///
/// Variants map directly to the status codes the HTTP surface assigns them;
/// see the service crate's `error_response` module for that mapping.
#[derive(Debug)]
pub enum WalletError {
    /// Missing `Idempotency-Key` header — a distinct client error from
    /// payload validation (spec §4.1, §6).
    MissingIdempotencyKey,
    /// `user_id` equals the reserved treasury identifier.
    ReservedUserId,
    /// Malformed or out-of-range payload caught at the request boundary:
    /// missing field, non-positive amount, empty asset code, or an unknown
    /// `transaction_type`.
    Validation(String),
    /// A required asset type or wallet row is missing.
    NotFound(String),
    /// Same `(key, user_id)` seen with a different payload hash.
    IdempotencyConflict,
    /// A `SPEND` would drive the user balance below zero.
    InsufficientFunds,
    /// Lock-wait timeout, serialization failure, or a benign duplicate-key
    /// race on the idempotency insert. Safe to retry.
    Transient(String),
    /// A broken invariant detected at runtime.
    Internal(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdempotencyKey => write!(f, "missing Idempotency-Key header"),
            Self::ReservedUserId => write!(f, "user_id must not be the system treasury"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::IdempotencyConflict => {
                write!(f, "idempotency key reused with a different payload")
            }
            Self::InsufficientFunds => write!(f, "insufficient funds"),
            Self::Transient(msg) => write!(f, "transient error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for WalletError {}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for WalletError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                WalletError::Transient(format!("duplicate key: {db_err}"))
            }
            sqlx::Error::PoolTimedOut => WalletError::Transient(err.to_string()),
            _ => WalletError::Internal(err.to_string()),
        }
    }
}
