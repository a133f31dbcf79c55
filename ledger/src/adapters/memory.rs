//! A development/test-only adapter backed by a single `tokio::sync::Mutex`.
//!
//! It satisfies invariants I1-I6 and properties P1-P7 because the entire
//! mutation algorithm runs under one exclusive lock held for the duration of
//! `execute_transaction` — a strictly *stronger* guarantee than the
//! row-level locking spec §5 requires, so correctness only gets easier to
//! hold. What it does **not** provide is the concurrency spec §5 actually
//! wants: mutations against disjoint wallets are serialized behind this one
//! mutex instead of proceeding in parallel. This adapter exists so the
//! engine's logic can be exercised without a live Postgres instance; it is
//! not a substitute for the Postgres adapter in production.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::asset::AssetType;
use crate::engine::WalletAdapter;
use crate::error::WalletError;
use crate::idempotency::IdempotencyRecord;
use crate::ledger_entry::LedgerEntry;
use crate::request::NormalizedRequest;
use crate::response::{BalanceView, HistoryEntry, HistoryView, TransactResponse};
use crate::wallet::{SYSTEM_TREASURY, Wallet};

#[derive(Default)]
struct Store {
    assets_by_code: HashMap<String, AssetType>,
    assets_by_id: HashMap<i64, AssetType>,
    wallets_by_id: HashMap<i64, Wallet>,
    wallet_index: HashMap<(String, i64), i64>,
    ledger_entries: Vec<LedgerEntry>,
    idempotency: HashMap<(String, String), IdempotencyRecord>,
}

pub struct InMemoryAdapter {
    store: Mutex<Store>,
    next_asset_id: AtomicI64,
    next_wallet_id: AtomicI64,
    next_ledger_id: AtomicI64,
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            next_asset_id: AtomicI64::new(1),
            next_wallet_id: AtomicI64::new(1),
            next_ledger_id: AtomicI64::new(1),
        }
    }

    /// Test/fixture helper — out-of-scope seeding in library form. Returns
    /// the existing row if the code was already seeded.
    pub async fn seed_asset(&self, code: &str, display_name: &str) -> AssetType {
        let mut store = self.store.lock().await;
        if let Some(existing) = store.assets_by_code.get(code) {
            return existing.clone();
        }
        let asset = AssetType {
            id: self.next_asset_id.fetch_add(1, Ordering::Relaxed),
            code: code.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };
        store.assets_by_code.insert(code.to_string(), asset.clone());
        store.assets_by_id.insert(asset.id, asset.clone());
        asset
    }

    /// Test/fixture helper. `asset_type_id` must already be seeded.
    pub async fn seed_wallet(&self, user_id: &str, asset_type_id: i64, balance: i64) -> Wallet {
        let mut store = self.store.lock().await;
        let id = self.next_wallet_id.fetch_add(1, Ordering::Relaxed);
        let wallet = Wallet {
            id,
            user_id: user_id.to_string(),
            asset_type_id,
            balance,
            created_at: Utc::now(),
        };
        store.wallet_index.insert((user_id.to_string(), asset_type_id), id);
        store.wallets_by_id.insert(id, wallet.clone());
        wallet
    }
}

#[async_trait]
impl WalletAdapter for InMemoryAdapter {
    async fn init_schema(&self) -> Result<(), WalletError> {
        Ok(())
    }

    async fn execute_transaction(
        &self,
        req: &NormalizedRequest,
    ) -> Result<TransactResponse, WalletError> {
        let mut store = self.store.lock().await;

        let asset = store
            .assets_by_code
            .get(&req.asset_code)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("asset type {}", req.asset_code)))?;

        let user_wallet_id = *store
            .wallet_index
            .get(&(req.user_id.clone(), asset.id))
            .ok_or_else(|| WalletError::NotFound(format!("wallet for {}", req.user_id)))?;
        let treasury_wallet_id = *store
            .wallet_index
            .get(&(SYSTEM_TREASURY.to_string(), asset.id))
            .ok_or_else(|| WalletError::NotFound("treasury wallet".to_string()))?;

        // Idempotency lookup (spec §4.5 step 4). Under this adapter's coarse
        // lock, no concurrent racer can ever win the duplicate-key case at
        // step 10 — the lock already serializes everything — but the
        // lookup/insert split is kept so the code reads the same as the
        // Postgres adapter's.
        let idem_key = (req.idempotency_key.clone(), req.user_id.clone());
        if let Some(existing) = store.idempotency.get(&idem_key) {
            if existing.request_hash != req.request_hash {
                return Err(WalletError::IdempotencyConflict);
            }
            let resp: TransactResponse = serde_json::from_str(&existing.response_payload)
                .map_err(|e| WalletError::Internal(format!("corrupt idempotency record: {e}")))?;
            return Ok(resp);
        }

        let (user_delta, treasury_delta) = req.transaction_type.deltas(req.amount);

        let user_wallet = store.wallets_by_id.get(&user_wallet_id).expect("indexed wallet exists");
        let new_user_balance = user_wallet.balance + user_delta;
        if new_user_balance < 0 {
            return Err(WalletError::InsufficientFunds);
        }

        {
            let treasury_wallet = store
                .wallets_by_id
                .get_mut(&treasury_wallet_id)
                .expect("indexed wallet exists");
            treasury_wallet.balance += treasury_delta;
        }
        {
            let user_wallet = store.wallets_by_id.get_mut(&user_wallet_id).expect("indexed wallet exists");
            user_wallet.balance = new_user_balance;
        }

        let tx_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let next_id = || self.next_ledger_id.fetch_add(1, Ordering::Relaxed);
        store.ledger_entries.push(LedgerEntry {
            id: next_id(),
            transaction_id: tx_id.clone(),
            wallet_id: user_wallet_id,
            amount: user_delta,
            reason: req.transaction_type,
            created_at: now,
        });
        store.ledger_entries.push(LedgerEntry {
            id: next_id(),
            transaction_id: tx_id.clone(),
            wallet_id: treasury_wallet_id,
            amount: treasury_delta,
            reason: req.transaction_type,
            created_at: now,
        });

        let response = TransactResponse {
            tx_id,
            user_id: req.user_id.clone(),
            transaction_type: req.transaction_type,
            amount: req.amount,
            new_balance: new_user_balance,
            asset_type_id: asset.id,
            asset_code: asset.code.clone(),
        };

        let payload = serde_json::to_string(&response)
            .map_err(|e| WalletError::Internal(format!("failed to serialize response: {e}")))?;
        store.idempotency.insert(
            idem_key,
            IdempotencyRecord {
                key: req.idempotency_key.clone(),
                user_id: req.user_id.clone(),
                request_hash: req.request_hash.clone(),
                response_payload: payload,
                created_at: now,
            },
        );

        Ok(response)
    }

    async fn read_balance(&self, user_id: &str, asset_code: &str) -> Result<BalanceView, WalletError> {
        let store = self.store.lock().await;
        let asset = store
            .assets_by_code
            .get(asset_code)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("asset type {asset_code}")))?;
        let wallet_id = *store
            .wallet_index
            .get(&(user_id.to_string(), asset.id))
            .ok_or_else(|| WalletError::NotFound(format!("wallet for {user_id}")))?;
        let wallet = store.wallets_by_id.get(&wallet_id).expect("indexed wallet exists");
        Ok(BalanceView {
            user_id: user_id.to_string(),
            balance: wallet.balance,
            asset_type_id: asset.id,
            asset_code: asset.code,
        })
    }

    async fn read_history(&self, user_id: &str, asset_code: &str) -> Result<HistoryView, WalletError> {
        let store = self.store.lock().await;
        let asset = store
            .assets_by_code
            .get(asset_code)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("asset type {asset_code}")))?;
        let wallet_id = *store
            .wallet_index
            .get(&(user_id.to_string(), asset.id))
            .ok_or_else(|| WalletError::NotFound(format!("wallet for {user_id}")))?;
        let wallet = store.wallets_by_id.get(&wallet_id).expect("indexed wallet exists");

        let mut entries: Vec<&LedgerEntry> = store
            .ledger_entries
            .iter()
            .filter(|e| e.wallet_id == wallet_id)
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let transactions = entries
            .into_iter()
            .map(|e| HistoryEntry {
                transaction_id: e.transaction_id.clone(),
                amount: e.amount,
                reason: e.reason,
                created_at: e.created_at,
            })
            .collect();

        Ok(HistoryView {
            user_id: user_id.to_string(),
            asset_code: asset.code,
            asset_type_id: asset.id,
            current_balance: wallet.balance,
            transactions,
        })
    }
}
