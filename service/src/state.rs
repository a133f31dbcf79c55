use std::sync::Arc;

use wallet_ledger::Engine;
use wallet_ledger::adapters::PostgresAdapter;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine<PostgresAdapter>>,
}

impl AppState {
    pub fn new(engine: Engine<PostgresAdapter>) -> Self {
        Self { engine: Arc::new(engine) }
    }
}
