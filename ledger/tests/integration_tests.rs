use wallet_ledger::adapters::InMemoryAdapter;
use wallet_ledger::{Engine, NormalizedRequest, RawTransactRequest, TransactionType, WalletError};

async fn seeded_engine() -> (Engine<InMemoryAdapter>, i64) {
    let adapter = InMemoryAdapter::new();
    let asset = adapter.seed_asset("GOLD_COIN", "Gold Coin").await;
    adapter.seed_wallet("user_123", asset.id, 100).await;
    adapter
        .seed_wallet(wallet_ledger::SYSTEM_TREASURY, asset.id, 1_000_000)
        .await;
    (Engine::new(adapter), asset.id)
}

fn request(user_id: &str, amount: i64, kind: &str, asset: &str) -> RawTransactRequest {
    RawTransactRequest {
        user_id: user_id.to_string(),
        amount,
        transaction_type: kind.to_string(),
        asset_code: asset.to_string(),
    }
}

#[tokio::test]
async fn topup_happy_path_credits_user_and_debits_treasury() {
    let (engine, asset_id) = seeded_engine().await;

    let req = NormalizedRequest::new(
        request("user_123", 50, "TOPUP", "gold_coin"),
        Some("K1".to_string()),
    )
    .unwrap();
    let resp = engine.transact(req).await.unwrap();

    assert_eq!(resp.new_balance, 150);
    assert_eq!(resp.asset_code, "GOLD_COIN");
    assert_eq!(resp.asset_type_id, asset_id);

    let balance = engine.balance("user_123", "GOLD_COIN").await.unwrap();
    assert_eq!(balance.balance, 150);

    let treasury = engine
        .balance(wallet_ledger::SYSTEM_TREASURY, "GOLD_COIN")
        .await
        .unwrap();
    assert_eq!(treasury.balance, 999_950);
}

#[tokio::test]
async fn idempotent_replay_is_byte_identical_and_writes_once() {
    let (engine, _) = seeded_engine().await;

    let first = NormalizedRequest::new(
        request("user_123", 50, "TOPUP", "GOLD_COIN"),
        Some("K1".to_string()),
    )
    .unwrap();
    let resp1 = engine.transact(first).await.unwrap();

    let replay = NormalizedRequest::new(
        request("user_123", 50, "TOPUP", "GOLD_COIN"),
        Some("K1".to_string()),
    )
    .unwrap();
    let resp2 = engine.transact(replay).await.unwrap();

    assert_eq!(resp1, resp2);

    let history = engine.transactions("user_123", "GOLD_COIN").await.unwrap();
    let entries_for_tx: Vec<_> = history
        .transactions
        .iter()
        .filter(|e| e.transaction_id == resp1.tx_id)
        .collect();
    assert_eq!(entries_for_tx.len(), 1);
}

#[tokio::test]
async fn idempotency_conflict_on_reused_key_different_payload() {
    let (engine, _) = seeded_engine().await;

    let first = NormalizedRequest::new(
        request("user_123", 50, "TOPUP", "GOLD_COIN"),
        Some("K1".to_string()),
    )
    .unwrap();
    engine.transact(first).await.unwrap();

    let conflicting = NormalizedRequest::new(
        request("user_123", 30, "SPEND", "GOLD_COIN"),
        Some("K1".to_string()),
    )
    .unwrap();
    let err = engine.transact(conflicting).await.unwrap_err();
    assert!(matches!(err, WalletError::IdempotencyConflict));

    let balance = engine.balance("user_123", "GOLD_COIN").await.unwrap();
    assert_eq!(balance.balance, 150);
}

#[tokio::test]
async fn insufficient_funds_leaves_balance_unchanged() {
    let (engine, _) = seeded_engine().await;

    engine
        .transact(
            NormalizedRequest::new(
                request("user_123", 50, "TOPUP", "GOLD_COIN"),
                Some("K1".to_string()),
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let overdraft = NormalizedRequest::new(
        request("user_123", 999_999, "SPEND", "GOLD_COIN"),
        Some("K2".to_string()),
    )
    .unwrap();
    let err = engine.transact(overdraft).await.unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));

    let balance = engine.balance("user_123", "GOLD_COIN").await.unwrap();
    assert_eq!(balance.balance, 150);

    let history = engine.transactions("user_123", "GOLD_COIN").await.unwrap();
    assert!(history.transactions.iter().all(|e| e.amount != -999_999));
}

#[tokio::test]
async fn exact_balance_spend_zeroes_out() {
    let (engine, _) = seeded_engine().await;

    engine
        .transact(
            NormalizedRequest::new(
                request("user_123", 50, "TOPUP", "GOLD_COIN"),
                Some("K1".to_string()),
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let spend = NormalizedRequest::new(
        request("user_123", 150, "SPEND", "GOLD_COIN"),
        Some("K3".to_string()),
    )
    .unwrap();
    let resp = engine.transact(spend).await.unwrap();
    assert_eq!(resp.new_balance, 0);
}

#[tokio::test]
async fn reserved_user_id_is_rejected_before_the_engine_sees_it() {
    let err = NormalizedRequest::new(
        request(wallet_ledger::SYSTEM_TREASURY, 10, "TOPUP", "GOLD_COIN"),
        Some("K1".to_string()),
    )
    .unwrap_err();
    assert!(matches!(err, WalletError::ReservedUserId));
}

#[tokio::test]
async fn unknown_asset_and_wallet_are_not_found() {
    let (engine, _) = seeded_engine().await;

    let err = engine.balance("user_123", "DIAMOND").await.unwrap_err();
    assert!(matches!(err, WalletError::NotFound(_)));

    let err = engine.balance("nobody", "GOLD_COIN").await.unwrap_err();
    assert!(matches!(err, WalletError::NotFound(_)));
}

#[tokio::test]
async fn history_is_ordered_newest_first() {
    let (engine, _) = seeded_engine().await;

    for (i, key) in ["A", "B", "C"].iter().enumerate() {
        engine
            .transact(
                NormalizedRequest::new(
                    request("user_123", (i as i64 + 1) * 10, "TOPUP", "GOLD_COIN"),
                    Some(key.to_string()),
                )
                .unwrap(),
            )
            .await
            .unwrap();
    }

    let history = engine.transactions("user_123", "GOLD_COIN").await.unwrap();
    let amounts: Vec<i64> = history.transactions.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![30, 20, 10]);
}

#[tokio::test]
async fn fifty_concurrent_mutations_preserve_the_ledger_invariant() {
    use std::sync::Arc;

    let adapter = InMemoryAdapter::new();
    let asset = adapter.seed_asset("GOLD_COIN", "Gold Coin").await;
    adapter.seed_wallet("user_123", asset.id, 10_000).await;
    adapter
        .seed_wallet(wallet_ledger::SYSTEM_TREASURY, asset.id, 1_000_000)
        .await;
    let engine = Arc::new(Engine::new(adapter));

    let mut handles = Vec::new();
    let mut expected_delta = 0i64;
    for i in 0..50 {
        let (kind, amount) = if i % 2 == 0 { ("TOPUP", 10) } else { ("SPEND", 1) };
        expected_delta += if kind == "TOPUP" { amount } else { -amount };
        let engine = Arc::clone(&engine);
        let key = format!("concurrent-{i}");
        handles.push(tokio::spawn(async move {
            let req = NormalizedRequest::new(request("user_123", amount, kind, "GOLD_COIN"), Some(key)).unwrap();
            engine.transact(req).await
        }));
    }

    let mut error_count = 0;
    for handle in handles {
        if handle.await.unwrap().is_err() {
            error_count += 1;
        }
    }
    assert_eq!(error_count, 0, "no request should fail from a starting balance that cannot underflow");

    let balance = engine.balance("user_123", "GOLD_COIN").await.unwrap();
    assert_eq!(balance.balance, 10_000 + expected_delta);

    let history = engine.transactions("user_123", "GOLD_COIN").await.unwrap();
    let ledger_sum: i64 = history.transactions.iter().map(|e| e.amount).sum();
    assert_eq!(ledger_sum, balance.balance - 10_000);
}

#[tokio::test]
async fn every_transaction_writes_exactly_two_offsetting_entries() {
    let (engine, _) = seeded_engine().await;

    let resp = engine
        .transact(
            NormalizedRequest::new(
                request("user_123", 50, "BONUS", "GOLD_COIN"),
                Some("K1".to_string()),
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let user_history = engine.transactions("user_123", "GOLD_COIN").await.unwrap();
    let user_entry = user_history
        .transactions
        .iter()
        .find(|e| e.transaction_id == resp.tx_id)
        .unwrap();

    let treasury_history = engine
        .transactions(wallet_ledger::SYSTEM_TREASURY, "GOLD_COIN")
        .await
        .unwrap();
    let treasury_entry = treasury_history
        .transactions
        .iter()
        .find(|e| e.transaction_id == resp.tx_id)
        .unwrap();

    assert_eq!(user_entry.amount + treasury_entry.amount, 0);
    assert_eq!(user_entry.amount, 50);
}

#[tokio::test]
async fn transaction_type_enum_round_trips() {
    assert_eq!(TransactionType::parse("SPEND").unwrap().as_str(), "SPEND");
}
