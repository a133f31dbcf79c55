use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::asset::normalize_asset_code;
use crate::error::WalletError;
use crate::transaction_type::TransactionType;
use crate::wallet::SYSTEM_TREASURY;

/// The raw, wire-shaped mutation request — whatever the HTTP layer
/// deserialized from the JSON body, before any normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransactRequest {
    pub user_id: String,
    pub amount: i64,
    pub transaction_type: String,
    pub asset_code: String,
}

/// A validated, canonicalized mutation request plus the idempotency
/// metadata the engine needs to resolve a retry. Constructing one is the
/// only way to obtain a `transaction_type`/`asset_code` the rest of the
/// crate trusts, which is why every field is private and every entry point
/// is a validating constructor.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub user_id: String,
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub asset_code: String,
    pub idempotency_key: String,
    pub request_hash: String,
}

impl NormalizedRequest {
    /// Applies every rule in the request-boundary normalization table and
    /// computes the canonical request hash. Returns `Validation` for any
    /// rule violation; the engine never opens a database transaction for a
    /// request that fails here.
    pub fn new(raw: RawTransactRequest, idempotency_key: Option<String>) -> Result<Self, WalletError> {
        let idempotency_key = match idempotency_key {
            Some(k) if !k.is_empty() => k,
            _ => return Err(WalletError::MissingIdempotencyKey),
        };

        if raw.user_id == SYSTEM_TREASURY {
            return Err(WalletError::ReservedUserId);
        }

        if raw.amount <= 0 {
            return Err(WalletError::Validation("amount must be positive".to_string()));
        }

        let transaction_type = TransactionType::parse(&raw.transaction_type)
            .ok_or_else(|| WalletError::Validation(format!("unknown transaction_type: {}", raw.transaction_type)))?;

        let asset_code = normalize_asset_code(&raw.asset_code)
            .ok_or_else(|| WalletError::Validation("asset_code must not be blank".to_string()))?;

        let request_hash = canonical_request_hash(&raw.user_id, raw.amount, transaction_type, &asset_code);

        Ok(Self {
            user_id: raw.user_id,
            amount: raw.amount,
            transaction_type,
            asset_code,
            idempotency_key,
            request_hash,
        })
    }
}

/// SHA-256 hex digest over the canonical JSON encoding described in spec
/// §4.1: keys `user_id`, `amount`, `transaction_type`, `asset_code` only,
/// sorted lexicographically, no insignificant whitespace, `amount` as a
/// bare integer, the other two fields as their post-normalization strings.
///
/// A `BTreeMap` gives the lexicographic key ordering for free — serde_json
/// serializes map keys in iteration order, and `BTreeMap`'s iteration order
/// is the sorted order.
pub fn canonical_request_hash(
    user_id: &str,
    amount: i64,
    transaction_type: TransactionType,
    asset_code: &str,
) -> String {
    let mut fields: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
    fields.insert("amount", serde_json::Value::from(amount));
    fields.insert("asset_code", serde_json::Value::from(asset_code));
    fields.insert("transaction_type", serde_json::Value::from(transaction_type.as_str()));
    fields.insert("user_id", serde_json::Value::from(user_id));

    let canonical = serde_json::to_vec(&fields).expect("canonical payload is always serializable");

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(user_id: &str, amount: i64, tx: &str, asset: &str) -> RawTransactRequest {
        RawTransactRequest {
            user_id: user_id.to_string(),
            amount,
            transaction_type: tx.to_string(),
            asset_code: asset.to_string(),
        }
    }

    #[test]
    fn missing_idempotency_key_is_rejected() {
        let err = NormalizedRequest::new(raw("u1", 10, "TOPUP", "GOLD"), None).unwrap_err();
        assert!(matches!(err, WalletError::MissingIdempotencyKey));
    }

    #[test]
    fn empty_idempotency_key_is_rejected() {
        let err =
            NormalizedRequest::new(raw("u1", 10, "TOPUP", "GOLD"), Some(String::new())).unwrap_err();
        assert!(matches!(err, WalletError::MissingIdempotencyKey));
    }

    #[test]
    fn treasury_user_id_is_rejected() {
        let err = NormalizedRequest::new(
            raw(SYSTEM_TREASURY, 10, "TOPUP", "GOLD"),
            Some("k1".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, WalletError::ReservedUserId));
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        for bad in [0, -5] {
            let err = NormalizedRequest::new(raw("u1", bad, "TOPUP", "GOLD"), Some("k1".to_string()))
                .unwrap_err();
            assert!(matches!(err, WalletError::Validation(_)));
        }
    }

    #[test]
    fn unknown_transaction_type_is_rejected() {
        let err = NormalizedRequest::new(raw("u1", 10, "REFUND", "GOLD"), Some("k1".to_string()))
            .unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[test]
    fn blank_asset_code_is_rejected() {
        let err = NormalizedRequest::new(raw("u1", 10, "TOPUP", "   "), Some("k1".to_string()))
            .unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[test]
    fn asset_code_is_upcased_and_trimmed() {
        let req = NormalizedRequest::new(raw("u1", 10, "TOPUP", " gold_coin "), Some("k1".to_string()))
            .unwrap();
        assert_eq!(req.asset_code, "GOLD_COIN");
    }

    #[test]
    fn hash_is_stable_for_equivalent_requests() {
        let a = canonical_request_hash("u1", 10, TransactionType::Topup, "GOLD_COIN");
        let b = canonical_request_hash("u1", 10, TransactionType::Topup, "GOLD_COIN");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_differs_on_any_field_change() {
        let base = canonical_request_hash("u1", 10, TransactionType::Topup, "GOLD_COIN");
        assert_ne!(base, canonical_request_hash("u2", 10, TransactionType::Topup, "GOLD_COIN"));
        assert_ne!(base, canonical_request_hash("u1", 11, TransactionType::Topup, "GOLD_COIN"));
        assert_ne!(base, canonical_request_hash("u1", 10, TransactionType::Spend, "GOLD_COIN"));
        assert_ne!(base, canonical_request_hash("u1", 10, TransactionType::Topup, "DIAMOND"));
    }
}
