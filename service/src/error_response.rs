use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use wallet_ledger::WalletError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Wraps [`WalletError`] so we can implement [`IntoResponse`] for it without
/// the orphan rule getting in the way.
pub struct ApiError(pub WalletError);

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            WalletError::MissingIdempotencyKey => (StatusCode::BAD_REQUEST, "missing_idempotency_key"),
            WalletError::ReservedUserId => (StatusCode::BAD_REQUEST, "reserved_user_id"),
            WalletError::InsufficientFunds => (StatusCode::BAD_REQUEST, "insufficient_funds"),
            WalletError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            WalletError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            WalletError::IdempotencyConflict => (StatusCode::CONFLICT, "idempotency_conflict"),
            WalletError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "transient"),
            WalletError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let body = ErrorBody {
            error: kind,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
