//! Postgres-backed [`WalletAdapter`]. Every mutation runs inside a single
//! `sqlx::Transaction` that this module alone begins and commits; row locks
//! are acquired with `SELECT ... FOR UPDATE` in ascending wallet-id order so
//! no two concurrent mutations over the same (user, treasury) pair can form
//! a hold-and-wait cycle (spec §5).

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::asset::AssetType;
use crate::engine::WalletAdapter;
use crate::error::WalletError;
use crate::ledger_entry::LedgerEntry;
use crate::request::NormalizedRequest;
use crate::response::{BalanceView, HistoryEntry, HistoryView, TransactResponse};
use crate::transaction_type::TransactionType;
use crate::wallet::{SYSTEM_TREASURY, Wallet};

/// How long a lock-acquiring read will wait before Postgres raises
/// `lock_not_available`, which we surface as a `Transient` error (spec §5).
const LOCK_WAIT_TIMEOUT: &str = "5s";

/// Postgres error code for `lock_not_available`, raised when `lock_timeout`
/// is exceeded.
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";

pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sql_err(err: sqlx::Error) -> WalletError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(PG_LOCK_NOT_AVAILABLE) {
            return WalletError::Transient("lock wait timeout".to_string());
        }
        if db_err.is_unique_violation() {
            return WalletError::Transient(format!("duplicate key: {db_err}"));
        }
    }
    WalletError::Internal(err.to_string())
}

fn row_to_asset(row: &sqlx::postgres::PgRow) -> Result<AssetType, WalletError> {
    Ok(AssetType {
        id: row.try_get("id").map_err(map_sql_err)?,
        code: row.try_get("code").map_err(map_sql_err)?,
        display_name: row.try_get("display_name").map_err(map_sql_err)?,
        created_at: row.try_get("created_at").map_err(map_sql_err)?,
    })
}

fn row_to_wallet(row: &sqlx::postgres::PgRow) -> Result<Wallet, WalletError> {
    Ok(Wallet {
        id: row.try_get("id").map_err(map_sql_err)?,
        user_id: row.try_get("user_id").map_err(map_sql_err)?,
        asset_type_id: row.try_get("asset_type_id").map_err(map_sql_err)?,
        balance: row.try_get("balance").map_err(map_sql_err)?,
        created_at: row.try_get("created_at").map_err(map_sql_err)?,
    })
}

async fn fetch_asset_by_code(
    tx: &mut Transaction<'_, Postgres>,
    code: &str,
) -> Result<AssetType, WalletError> {
    let row = sqlx::query("SELECT id, code, display_name, created_at FROM asset_types WHERE code = $1")
        .bind(code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sql_err)?
        .ok_or_else(|| WalletError::NotFound(format!("asset type {code}")))?;
    row_to_asset(&row)
}

async fn fetch_wallet(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    asset_type_id: i64,
) -> Result<Wallet, WalletError> {
    let row = sqlx::query(
        "SELECT id, user_id, asset_type_id, balance, created_at FROM wallets WHERE user_id = $1 AND asset_type_id = $2",
    )
    .bind(user_id)
    .bind(asset_type_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sql_err)?
    .ok_or_else(|| WalletError::NotFound(format!("wallet for {user_id}")))?;
    row_to_wallet(&row)
}

/// Locks a single wallet row and returns its authoritative post-lock state.
/// Callers must invoke this twice, in ascending `wallet_id` order, to
/// acquire the pair without risking a deadlock against a concurrent
/// mutation locking the same two rows in the opposite order.
async fn lock_wallet_row(tx: &mut Transaction<'_, Postgres>, wallet_id: i64) -> Result<Wallet, WalletError> {
    let row = sqlx::query(
        "SELECT id, user_id, asset_type_id, balance, created_at FROM wallets WHERE id = $1 FOR UPDATE",
    )
    .bind(wallet_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sql_err)?
    .ok_or_else(|| WalletError::Internal(format!("wallet {wallet_id} vanished under lock")))?;
    row_to_wallet(&row)
}

async fn lookup_idempotency(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    user_id: &str,
) -> Result<Option<(String, String)>, WalletError> {
    let row = sqlx::query(
        "SELECT request_hash, response_payload FROM idempotency_records WHERE key = $1 AND user_id = $2",
    )
    .bind(key)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sql_err)?;

    match row {
        Some(row) => {
            let hash: String = row.try_get("request_hash").map_err(map_sql_err)?;
            let payload: String = row.try_get("response_payload").map_err(map_sql_err)?;
            Ok(Some((hash, payload)))
        }
        None => Ok(None),
    }
}

async fn insert_idempotency(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    user_id: &str,
    request_hash: &str,
    response_payload: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO idempotency_records (key, user_id, request_hash, response_payload) VALUES ($1, $2, $3, $4)",
    )
    .bind(key)
    .bind(user_id)
    .bind(request_hash)
    .bind(response_payload)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_ledger_pair(
    tx: &mut Transaction<'_, Postgres>,
    transaction_id: &str,
    reason: TransactionType,
    user_wallet_id: i64,
    user_amount: i64,
    treasury_wallet_id: i64,
    treasury_amount: i64,
) -> Result<(), WalletError> {
    sqlx::query(
        "INSERT INTO ledger_entries (transaction_id, wallet_id, amount, reason) VALUES ($1, $2, $3, $4), ($1, $5, $6, $4)",
    )
    .bind(transaction_id)
    .bind(user_wallet_id)
    .bind(user_amount)
    .bind(reason.as_str())
    .bind(treasury_wallet_id)
    .bind(treasury_amount)
    .execute(&mut **tx)
    .await
    .map_err(map_sql_err)?;
    Ok(())
}

#[async_trait]
impl WalletAdapter for PostgresAdapter {
    async fn init_schema(&self) -> Result<(), WalletError> {
        let mut tx = self.pool.begin().await.map_err(map_sql_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS asset_types (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sql_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                asset_type_id BIGINT NOT NULL REFERENCES asset_types(id),
                balance BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (user_id, asset_type_id)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sql_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id BIGSERIAL PRIMARY KEY,
                transaction_id TEXT NOT NULL,
                wallet_id BIGINT NOT NULL REFERENCES wallets(id),
                amount BIGINT NOT NULL,
                reason TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sql_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ledger_entries_wallet_created ON ledger_entries (wallet_id, created_at DESC, id DESC)",
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sql_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ledger_entries_tx ON ledger_entries (transaction_id)")
            .execute(&mut *tx)
            .await
            .map_err(map_sql_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS idempotency_records (
                key TEXT NOT NULL,
                user_id TEXT NOT NULL,
                request_hash TEXT NOT NULL,
                response_payload TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (key, user_id)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sql_err)?;

        tx.commit().await.map_err(map_sql_err)?;
        Ok(())
    }

    async fn execute_transaction(
        &self,
        req: &NormalizedRequest,
    ) -> Result<TransactResponse, WalletError> {
        let mut tx = self.pool.begin().await.map_err(map_sql_err)?;

        sqlx::query(&format!("SET LOCAL lock_timeout = '{LOCK_WAIT_TIMEOUT}'"))
            .execute(&mut *tx)
            .await
            .map_err(map_sql_err)?;

        let asset = fetch_asset_by_code(&mut tx, &req.asset_code).await?;
        let user_wallet = fetch_wallet(&mut tx, &req.user_id, asset.id).await?;
        let treasury_wallet = fetch_wallet(&mut tx, SYSTEM_TREASURY, asset.id).await?;

        if let Some((existing_hash, existing_payload)) =
            lookup_idempotency(&mut tx, &req.idempotency_key, &req.user_id).await?
        {
            if existing_hash != req.request_hash {
                tx.rollback().await.map_err(map_sql_err)?;
                return Err(WalletError::IdempotencyConflict);
            }
            // No-op commit: nothing was written, but we still own the
            // transaction we opened.
            tx.commit().await.map_err(map_sql_err)?;
            return serde_json::from_str(&existing_payload)
                .map_err(|e| WalletError::Internal(format!("corrupt idempotency record: {e}")));
        }

        let (lo_id, hi_id) = if user_wallet.id < treasury_wallet.id {
            (user_wallet.id, treasury_wallet.id)
        } else {
            (treasury_wallet.id, user_wallet.id)
        };
        let lo = lock_wallet_row(&mut tx, lo_id).await?;
        let hi = lock_wallet_row(&mut tx, hi_id).await?;
        let (locked_user, locked_treasury) = if lo.id == user_wallet.id { (lo, hi) } else { (hi, lo) };

        let (user_delta, treasury_delta) = req.transaction_type.deltas(req.amount);
        let new_user_balance = locked_user.balance + user_delta;
        if new_user_balance < 0 {
            tx.rollback().await.map_err(map_sql_err)?;
            return Err(WalletError::InsufficientFunds);
        }
        let new_treasury_balance = locked_treasury.balance + treasury_delta;

        sqlx::query("UPDATE wallets SET balance = $1 WHERE id = $2")
            .bind(new_user_balance)
            .bind(locked_user.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sql_err)?;
        sqlx::query("UPDATE wallets SET balance = $1 WHERE id = $2")
            .bind(new_treasury_balance)
            .bind(locked_treasury.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sql_err)?;

        let tx_id = Uuid::new_v4().to_string();
        write_ledger_pair(
            &mut tx,
            &tx_id,
            req.transaction_type,
            locked_user.id,
            user_delta,
            locked_treasury.id,
            treasury_delta,
        )
        .await?;

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

        match insert_idempotency(&mut tx, &req.idempotency_key, &req.user_id, &req.request_hash, &payload).await {
            Ok(()) => {
                tx.commit().await.map_err(map_sql_err)?;
                Ok(response)
            }
            Err(err) if is_unique_violation(&err) => {
                // A concurrent request with the same (key, user_id) won the
                // race. Roll back our tentative writes entirely, then look
                // up the winner's record in a fresh transaction.
                tx.rollback().await.map_err(map_sql_err)?;
                let mut read_tx = self.pool.begin().await.map_err(map_sql_err)?;
                let existing = lookup_idempotency(&mut read_tx, &req.idempotency_key, &req.user_id).await?;
                read_tx.rollback().await.map_err(map_sql_err)?;
                match existing {
                    Some((hash, payload)) if hash == req.request_hash => serde_json::from_str(&payload)
                        .map_err(|e| WalletError::Internal(format!("corrupt idempotency record: {e}"))),
                    Some(_) => Err(WalletError::IdempotencyConflict),
                    None => Err(WalletError::Internal(
                        "idempotency insert lost a race but no winning record is visible".to_string(),
                    )),
                }
            }
            Err(err) => {
                tx.rollback().await.ok();
                Err(map_sql_err(err))
            }
        }
    }

    async fn read_balance(&self, user_id: &str, asset_code: &str) -> Result<BalanceView, WalletError> {
        let mut conn = self.pool.acquire().await.map_err(map_sql_err)?;

        let asset_row = sqlx::query("SELECT id, code, display_name, created_at FROM asset_types WHERE code = $1")
            .bind(asset_code)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_sql_err)?
            .ok_or_else(|| WalletError::NotFound(format!("asset type {asset_code}")))?;
        let asset = row_to_asset(&asset_row)?;

        let wallet_row = sqlx::query(
            "SELECT id, user_id, asset_type_id, balance, created_at FROM wallets WHERE user_id = $1 AND asset_type_id = $2",
        )
        .bind(user_id)
        .bind(asset.id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sql_err)?
        .ok_or_else(|| WalletError::NotFound(format!("wallet for {user_id}")))?;
        let wallet = row_to_wallet(&wallet_row)?;

        Ok(BalanceView {
            user_id: user_id.to_string(),
            balance: wallet.balance,
            asset_type_id: asset.id,
            asset_code: asset.code,
        })
    }

    async fn read_history(&self, user_id: &str, asset_code: &str) -> Result<HistoryView, WalletError> {
        let mut conn = self.pool.acquire().await.map_err(map_sql_err)?;

        let asset_row = sqlx::query("SELECT id, code, display_name, created_at FROM asset_types WHERE code = $1")
            .bind(asset_code)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_sql_err)?
            .ok_or_else(|| WalletError::NotFound(format!("asset type {asset_code}")))?;
        let asset = row_to_asset(&asset_row)?;

        let wallet_row = sqlx::query(
            "SELECT id, user_id, asset_type_id, balance, created_at FROM wallets WHERE user_id = $1 AND asset_type_id = $2",
        )
        .bind(user_id)
        .bind(asset.id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sql_err)?
        .ok_or_else(|| WalletError::NotFound(format!("wallet for {user_id}")))?;
        let wallet = row_to_wallet(&wallet_row)?;

        let rows = sqlx::query(
            "SELECT id, transaction_id, wallet_id, amount, reason, created_at FROM ledger_entries \
             WHERE wallet_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(wallet.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sql_err)?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in &rows {
            let reason_str: String = row.try_get("reason").map_err(map_sql_err)?;
            let reason = TransactionType::parse(&reason_str)
                .ok_or_else(|| WalletError::Internal(format!("unrecognized reason tag: {reason_str}")))?;
            let entry = LedgerEntry {
                id: row.try_get("id").map_err(map_sql_err)?,
                transaction_id: row.try_get("transaction_id").map_err(map_sql_err)?,
                wallet_id: row.try_get("wallet_id").map_err(map_sql_err)?,
                amount: row.try_get("amount").map_err(map_sql_err)?,
                reason,
                created_at: row.try_get("created_at").map_err(map_sql_err)?,
            };
            transactions.push(HistoryEntry {
                transaction_id: entry.transaction_id,
                amount: entry.amount,
                reason: entry.reason,
                created_at: entry.created_at,
            });
        }

        Ok(HistoryView {
            user_id: user_id.to_string(),
            asset_code: asset.code,
            asset_type_id: asset.id,
            current_balance: wallet.balance,
            transactions,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Seeds an asset type row; test/bootstrap helper, not part of the request
/// path. Returns the existing row if the code is already present.
pub async fn seed_asset_type(pool: &PgPool, code: &str, display_name: &str) -> Result<AssetType, WalletError> {
    let row = sqlx::query(
        r#"
        INSERT INTO asset_types (code, display_name)
        VALUES ($1, $2)
        ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code
        RETURNING id, code, display_name, created_at
        "#,
    )
    .bind(code)
    .bind(display_name)
    .fetch_one(pool)
    .await
    .map_err(map_sql_err)?;
    row_to_asset(&row)
}

/// Seeds a wallet row at a given starting balance; test/bootstrap helper.
pub async fn seed_wallet(pool: &PgPool, user_id: &str, asset_type_id: i64, balance: i64) -> Result<Wallet, WalletError> {
    let row = sqlx::query(
        r#"
        INSERT INTO wallets (user_id, asset_type_id, balance)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, asset_type_id) DO UPDATE SET balance = EXCLUDED.balance
        RETURNING id, user_id, asset_type_id, balance, created_at
        "#,
    )
    .bind(user_id)
    .bind(asset_type_id)
    .bind(balance)
    .fetch_one(pool)
    .await
    .map_err(map_sql_err)?;
    row_to_wallet(&row)
}
