use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};

use wallet_ledger::{HistoryView, require_asset_code};

use crate::error_response::ApiError;
use crate::state::AppState;

/// Returns the full per-user/asset ledger history, newest first. No
/// pagination: a documented limitation (spec §4.6), not an oversight — a
/// wallet's history is expected to stay small relative to a typical page
/// size for this system's closed-loop use case.
pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<HistoryView>, ApiError> {
    let asset_code = require_asset_code(params.get("asset_code").map(String::as_str))?;
    let view = state.engine.transactions(&user_id, &asset_code).await?;
    Ok(Json(view))
}
