mod balance;
mod health;
mod history;
mod transact;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/transact", post(transact::transact))
        .route("/balance/{user_id}", get(balance::balance))
        .route("/transactions/{user_id}", get(history::history))
        .with_state(state)
}
