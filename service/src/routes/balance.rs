use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};

use wallet_ledger::{BalanceView, require_asset_code};

use crate::error_response::ApiError;
use crate::state::AppState;

pub async fn balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<BalanceView>, ApiError> {
    let asset_code = require_asset_code(params.get("asset_code").map(String::as_str))?;
    let view = state.engine.balance(&user_id, &asset_code).await?;
    Ok(Json(view))
}
