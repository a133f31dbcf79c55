use axum::Json;
use serde_json::{Value, json};

/// No DB round-trip: a healthy process that cannot reach Postgres should
/// still answer liveness probes so the orchestrator doesn't restart it into
/// the same outage.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
