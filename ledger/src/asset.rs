use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Reference data for a supported virtual currency.
///
/// Inserted by seeding, never mutated, never deleted while wallets
/// reference it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetType {
    pub id: i64,
    pub code: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Uppercases and trims an asset code, per the request-boundary normalization
/// rule. Returns `None` if the result is empty.
pub fn normalize_asset_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_uppercase();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Normalizes a query-string `asset_code`, for the read endpoints. Blank or
/// absent is a validation error there too (spec §6), distinct from the
/// `NotFound` an unrecognized-but-present code produces downstream.
pub fn require_asset_code(raw: Option<&str>) -> Result<String, WalletError> {
    raw.and_then(normalize_asset_code)
        .ok_or_else(|| WalletError::Validation("asset_code is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_asset_code("  gold_coin \n"), Some("GOLD_COIN".to_string()));
    }

    #[test]
    fn rejects_blank_code() {
        assert_eq!(normalize_asset_code("   "), None);
    }
}
