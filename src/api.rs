//! REST wallet API for emberchain
//!
//! A thin request/response mapping over the ledger engine: status, wallet
//! connect, balance, mining trigger, transaction submission and history.
//! Validation failures surface as client-facing JSON error payloads; the
//! engine itself only ever signals them as booleans/`Err`.

use axum::{
    extract::{Query, State},
    http::{self, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::ChainError;
use crate::ledger::{Block, Ledger};
use crate::transaction::Transaction;

/// Shared state handed to every handler: the API owns nothing, it observes
/// and drives the one ledger instance.
#[derive(Clone)]
pub struct ApiContext {
    pub ledger: Arc<parking_lot::RwLock<Ledger>>,
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    Rejected(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Rejected(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Rejected(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct ConnectRequest {
    pub wallet_address: String,
    #[serde(default)]
    pub wallet_id: String,
}

#[derive(Deserialize)]
pub struct AddressQuery {
    #[serde(default)]
    pub wallet_address: String,
}

#[derive(Deserialize)]
pub struct MiningRequest {
    pub miner_address: String,
}

#[derive(Deserialize)]
pub struct TransactionRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Serialize)]
struct BlockResponse {
    index: u64,
    timestamp: DateTime<Utc>,
    proof: u64,
    previous_hash: String,
    hash: String,
    transactions: Vec<Transaction>,
}

impl From<Block> for BlockResponse {
    fn from(block: Block) -> Self {
        BlockResponse {
            index: block.index,
            timestamp: block.timestamp,
            proof: block.proof,
            previous_hash: block.previous_hash,
            hash: block.hash,
            transactions: block.transactions,
        }
    }
}

#[derive(Serialize)]
struct HistoryEntry {
    id: uuid::Uuid,
    sender: String,
    recipient: String,
    amount: Decimal,
    timestamp: DateTime<Utc>,
    /// `outgoing` or `incoming`, relative to the queried address.
    direction: &'static str,
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn get_status() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn connect_wallet(
    Json(request): Json<ConnectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.wallet_address.is_empty() {
        return Err(ApiError::InvalidInput(
            "Wallet address is required".to_string(),
        ));
    }
    info!(
        wallet = %request.wallet_address,
        id = %request.wallet_id,
        "wallet connected"
    );
    Ok(Json(serde_json::json!({
        "message": "Wallet connected successfully",
        "wallet_id": request.wallet_id,
        "wallet_address": request.wallet_address,
        "timestamp": Utc::now(),
    })))
}

async fn get_balance(
    State(ctx): State<ApiContext>,
    Query(query): Query<AddressQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.wallet_address.is_empty() {
        return Err(ApiError::InvalidInput(
            "Wallet address is required".to_string(),
        ));
    }
    let balance = ctx.ledger.read().balance_of(&query.wallet_address);
    Ok(Json(serde_json::json!({
        "wallet_address": query.wallet_address,
        "balance": balance,
        "status": "success",
    })))
}

/// Runs the full mining flow on the blocking pool: reward transaction, proof
/// search against the previous block's proof, then block assembly and the
/// nonce search. The ledger lock is taken inside the blocking task so the
/// async workers never carry the CPU-bound searches.
async fn mine_block(
    State(ctx): State<ApiContext>,
    Json(request): Json<MiningRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.miner_address.is_empty() {
        return Err(ApiError::InvalidInput(
            "Miner address is required".to_string(),
        ));
    }

    let ledger = ctx.ledger.clone();
    let miner_address = request.miner_address.clone();
    let block = tokio::task::spawn_blocking(move || ledger.write().mine_next(&miner_address))
        .await
        .map_err(|e| ApiError::InternalError(format!("mining task failed: {}", e)))?;

    info!(index = block.index, miner = %request.miner_address, "new block mined");
    Ok(Json(serde_json::json!({
        "message": "New block mined successfully",
        "block": BlockResponse::from(block),
    })))
}

async fn submit_transaction(
    State(ctx): State<ApiContext>,
    Json(request): Json<TransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.sender.is_empty() || request.recipient.is_empty() {
        return Err(ApiError::InvalidInput(
            "Sender and recipient are required".to_string(),
        ));
    }
    if request.amount <= Decimal::ZERO {
        return Err(ApiError::InvalidInput(
            "Amount must be greater than 0".to_string(),
        ));
    }

    let sender_balance = ctx.ledger.read().balance_of(&request.sender);
    if sender_balance < request.amount {
        return Err(ApiError::Rejected(format!(
            "Insufficient balance: {} available, {} required",
            sender_balance, request.amount
        )));
    }

    let transaction = Transaction {
        id: uuid::Uuid::new_v4(),
        sender: request.sender.clone(),
        recipient: request.recipient,
        amount: request.amount,
        timestamp: request.timestamp,
        signature: request.signature,
        public_key: request.public_key,
    };

    if transaction.signature.is_some() && transaction.public_key.is_some() && !transaction.verify()
    {
        return Err(ApiError::Rejected(
            "Invalid transaction signature".to_string(),
        ));
    }

    let summary = serde_json::json!({
        "id": transaction.id,
        "sender": transaction.sender,
        "recipient": transaction.recipient,
        "amount": transaction.amount,
        "timestamp": transaction.timestamp,
    });
    let block_index = ctx.ledger.write().create_transaction(transaction)?;

    info!(sender = %request.sender, "transaction accepted into pending pool");
    Ok(Json(serde_json::json!({
        "message": "Transaction created successfully",
        "transaction": summary,
        "block_index": block_index,
        "status": "pending",
    })))
}

async fn get_transaction_history(
    State(ctx): State<ApiContext>,
    Query(query): Query<AddressQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.wallet_address.is_empty() {
        return Err(ApiError::InvalidInput(
            "Wallet address is required".to_string(),
        ));
    }

    let history = ctx.ledger.read().history_of(&query.wallet_address);
    let entries: Vec<HistoryEntry> = history
        .into_iter()
        .map(|tx| {
            let direction = if tx.sender == query.wallet_address {
                "outgoing"
            } else {
                "incoming"
            };
            HistoryEntry {
                id: tx.id,
                sender: tx.sender,
                recipient: tx.recipient,
                amount: tx.amount,
                timestamp: tx.timestamp,
                direction,
            }
        })
        .collect();

    Ok(Json(serde_json::json!({
        "wallet_address": query.wallet_address,
        "total_count": entries.len(),
        "transactions": entries,
    })))
}

// ============================================================================
// API Server
// ============================================================================

/// Builds the full router (exposed for integration tests).
pub fn build_api_router(ctx: ApiContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![http::Method::GET, http::Method::POST])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/status", get(get_status))
        .route("/wallet/connect", post(connect_wallet))
        .route("/wallet/balance", get(get_balance))
        .route("/wallet/mine", post(mine_block))
        .route("/wallet/transaction", post(submit_transaction))
        .route("/wallet/transactions", get(get_transaction_history))
        .with_state(ctx);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Binds and serves the wallet API until the process exits.
pub async fn run_api_server(ctx: ApiContext, port: u16) -> Result<(), ChainError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ChainError::NetworkError(format!("failed to bind api port {}: {}", port, e)))?;

    info!(%addr, "wallet api listening");
    axum::serve(listener, build_api_router(ctx))
        .await
        .map_err(|e| ChainError::NetworkError(format!("api server failed: {}", e)))
}
