//! Integration tests for the emberchain wallet API
//!
//! Exercises the request/response mapping over a live ledger: status,
//! balance, mining, transaction submission and history.

use axum_test::TestServer;
use emberchain::api::{build_api_router, ApiContext};
use emberchain::crypto::KeyPair;
use emberchain::ledger::Ledger;
use emberchain::transaction::Transaction;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;

// Low difficulty keeps the mining endpoint fast in tests.
const TEST_DIFFICULTY: u32 = 1;

fn test_server() -> (TestServer, Arc<RwLock<Ledger>>) {
    let ledger = Arc::new(RwLock::new(Ledger::new(TEST_DIFFICULTY)));
    let app = build_api_router(ApiContext {
        ledger: ledger.clone(),
    });
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, ledger)
}

#[tokio::test]
async fn test_status_endpoint() {
    let (server, _) = test_server();

    let response = server.get("/api/status").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "online");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_wallet_connect() {
    let (server, _) = test_server();

    let response = server
        .post("/api/wallet/connect")
        .json(&json!({ "wallet_address": "abc123", "wallet_id": "w-1" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["wallet_address"], "abc123");
    assert_eq!(json["wallet_id"], "w-1");
    assert!(json["timestamp"].is_string());

    let response = server
        .post("/api/wallet/connect")
        .json(&json!({ "wallet_address": "" }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_balance_requires_address_and_defaults_to_zero() {
    let (server, _) = test_server();

    let response = server.get("/api/wallet/balance").await;
    assert_eq!(response.status_code(), 400);

    let response = server.get("/api/wallet/balance?wallet_address=nobody").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["balance"], "0");
    assert_eq!(json["status"], "success");
}

#[tokio::test]
async fn test_mining_rewards_the_miner() {
    let (server, ledger) = test_server();

    let response = server
        .post("/api/wallet/mine")
        .json(&json!({ "miner_address": "M" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["block"]["index"], 1);
    assert!(json["block"]["hash"].is_string());
    assert!(json["block"]["transactions"].is_array());

    assert_eq!(ledger.read().chain().len(), 2);
    assert!(ledger.read().pending().is_empty());

    let response = server.get("/api/wallet/balance?wallet_address=M").await;
    let json: Value = response.json();
    assert_eq!(json["balance"], "1");
}

#[tokio::test]
async fn test_submit_signed_transaction() {
    let (server, ledger) = test_server();

    let keypair = KeyPair::generate().unwrap();
    let address = keypair.address().unwrap();

    // Fund the sender with one confirmed block reward.
    ledger.write().mine_next(&address);

    let mut tx = Transaction::new(address.clone(), "bob".to_string(), Decimal::new(4, 1));
    tx.sign_with(&keypair).unwrap();

    let response = server
        .post("/api/wallet/transaction")
        .json(&json!({
            "sender": tx.sender,
            "recipient": tx.recipient,
            "amount": tx.amount,
            "timestamp": tx.timestamp,
            "signature": tx.signature,
            "public_key": tx.public_key,
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "pending");
    assert_eq!(json["block_index"], 2);
    assert!(json["transaction"]["id"].is_string());
    assert_eq!(ledger.read().pending().len(), 1);
}

#[tokio::test]
async fn test_submit_unsigned_transaction_from_funded_sender() {
    let (server, ledger) = test_server();
    ledger.write().mine_next("alice");

    let response = server
        .post("/api/wallet/transaction")
        .json(&json!({
            "sender": "alice",
            "recipient": "bob",
            "amount": "0.5",
            "timestamp": chrono::Utc::now(),
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "pending");
    assert_eq!(json["block_index"], 2);
    assert_eq!(ledger.read().pending().len(), 1);
}

#[tokio::test]
async fn test_submit_transaction_rejections() {
    let (server, _) = test_server();

    // Non-positive amount.
    let response = server
        .post("/api/wallet/transaction")
        .json(&json!({
            "sender": "a",
            "recipient": "b",
            "amount": "-5",
            "timestamp": chrono::Utc::now(),
        }))
        .await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert!(json["error"].is_string());

    // Insufficient balance.
    let response = server
        .post("/api/wallet/transaction")
        .json(&json!({
            "sender": "a",
            "recipient": "b",
            "amount": "1",
            "timestamp": chrono::Utc::now(),
        }))
        .await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Insufficient balance"));
}

#[tokio::test]
async fn test_tampered_signature_is_rejected() {
    let (server, ledger) = test_server();

    let keypair = KeyPair::generate().unwrap();
    let address = keypair.address().unwrap();
    ledger.write().mine_next(&address);

    let mut tx = Transaction::new(address.clone(), "bob".to_string(), Decimal::new(4, 1));
    tx.sign_with(&keypair).unwrap();

    // Signed amount differs from the submitted amount.
    let response = server
        .post("/api/wallet/transaction")
        .json(&json!({
            "sender": tx.sender,
            "recipient": tx.recipient,
            "amount": "0.9",
            "timestamp": tx.timestamp,
            "signature": tx.signature,
            "public_key": tx.public_key,
        }))
        .await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert_eq!(json["error"], "Invalid transaction signature");
}

#[tokio::test]
async fn test_transaction_history_with_direction() {
    let (server, ledger) = test_server();

    {
        let mut ledger = ledger.write();
        ledger.mine_next("M");
        ledger.mine_next("M");
    }

    let response = server
        .get("/api/wallet/transactions?wallet_address=M")
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["total_count"], 2);
    let entries = json["transactions"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert_eq!(entry["direction"], "incoming");
        assert_eq!(entry["recipient"], "M");
    }

    let response = server.get("/api/wallet/transactions").await;
    assert_eq!(response.status_code(), 400);
}
