use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use wallet_ledger::{NormalizedRequest, RawTransactRequest, TransactResponse};

use crate::error_response::ApiError;
use crate::state::AppState;

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

pub async fn transact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(raw): Json<RawTransactRequest>,
) -> Result<Json<TransactResponse>, ApiError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let req = NormalizedRequest::new(raw, idempotency_key)?;
    let resp = state.engine.transact(req).await?;
    Ok(Json(resp))
}
