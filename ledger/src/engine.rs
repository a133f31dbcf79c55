use async_trait::async_trait;
use tracing::Instrument;

use crate::error::WalletError;
use crate::request::NormalizedRequest;
use crate::response::{BalanceView, HistoryView, TransactResponse};

/// Storage abstraction for the transaction engine.
///
/// Each implementation owns the *entire* atomic mutation described in
/// spec §4.5 — resolving the asset and wallets, consulting the idempotency
/// store, locking and updating both wallet rows, writing the paired ledger
/// entries, and persisting the idempotency record — inside one database
/// transaction that it alone begins and commits. Splitting that sequence
/// across separate trait methods would force the transaction handle itself
/// across an async trait boundary for no benefit: every step must run
/// against the same connection and the same lock scope, so the adapter is
/// the natural unit of atomicity.
///
/// Implementations that cannot take row-level locks (the in-memory adapter)
/// must document what guarantee they substitute; see
/// [`crate::adapters::memory`].
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Idempotent `CREATE TABLE IF NOT EXISTS` / index bootstrap. A no-op
    /// for adapters with no persistent schema.
    async fn init_schema(&self) -> Result<(), WalletError>;

    /// Executes the mutation algorithm of spec §4.5 steps 1-11.
    async fn execute_transaction(
        &self,
        req: &NormalizedRequest,
    ) -> Result<TransactResponse, WalletError>;

    /// Balance read (spec §4.6, first operation). No locking.
    async fn read_balance(&self, user_id: &str, asset_code: &str) -> Result<BalanceView, WalletError>;

    /// Per-user/asset history, newest-first (spec §4.6, second operation).
    async fn read_history(&self, user_id: &str, asset_code: &str) -> Result<HistoryView, WalletError>;
}

/// Thin façade over a [`WalletAdapter`] that adds the observability span
/// every mutation request carries, regardless of which adapter backs it.
pub struct Engine<A> {
    adapter: A,
}

impl<A: WalletAdapter> Engine<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub async fn init_schema(&self) -> Result<(), WalletError> {
        self.adapter.init_schema().await
    }

    pub async fn transact(&self, req: NormalizedRequest) -> Result<TransactResponse, WalletError> {
        let span = tracing::info_span!(
            "wallet_transact",
            user_id = %req.user_id,
            asset_code = %req.asset_code,
            transaction_type = req.transaction_type.as_str(),
            idempotency_key = %req.idempotency_key,
        );

        async move {
            match self.adapter.execute_transaction(&req).await {
                Ok(resp) => {
                    tracing::debug!(tx_id = %resp.tx_id, new_balance = resp.new_balance, "transaction committed");
                    Ok(resp)
                }
                Err(WalletError::InsufficientFunds) => {
                    tracing::warn!("rejected: insufficient funds");
                    Err(WalletError::InsufficientFunds)
                }
                Err(WalletError::IdempotencyConflict) => {
                    tracing::warn!("rejected: idempotency key reused with a different payload");
                    Err(WalletError::IdempotencyConflict)
                }
                Err(err) => Err(err),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn balance(&self, user_id: &str, asset_code: &str) -> Result<BalanceView, WalletError> {
        self.adapter.read_balance(user_id, asset_code).await
    }

    pub async fn transactions(&self, user_id: &str, asset_code: &str) -> Result<HistoryView, WalletError> {
        self.adapter.read_history(user_id, asset_code).await
    }
}
