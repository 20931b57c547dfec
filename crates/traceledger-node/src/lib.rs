//! HTTP surface over a single, explicitly owned ledger.
//!
//! Each accepted transaction is sealed into its own block before the
//! response is sent. The proof search runs on the blocking pool and is
//! cancelled when the node shuts down.
use std::{sync::Arc, time::Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::Mutex};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use traceledger_core::{hash_block, Block, Ledger, LedgerError, Transaction};

#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Mutex<Ledger>>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Fires on shutdown; an in-flight proof search gives up when it does.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Submits one transaction and seals it into a new block.
    ///
    /// The ledger lock is held for the whole submit-and-seal sequence, so
    /// the drained pool is a consistent snapshot.
    pub async fn record_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<SealedTransaction, ApiError> {
        let ledger = Arc::clone(&self.ledger);
        let cancel = self.shutdown.clone();
        let started = Instant::now();
        let block = tokio::task::spawn_blocking(move || {
            let mut ledger = ledger.blocking_lock();
            ledger.submit_transaction(
                &request.sender_id,
                &request.receiver_id,
                request.amount,
                &request.product_id,
                &request.transaction_type,
            )?;
            let sealed = ledger.seal_block_cancellable(&cancel);
            if sealed.is_err() {
                // a failed request must not leave its transaction for the next block
                ledger.withdraw_last_pending();
            }
            sealed
        })
        .await??;

        Ok(SealedTransaction {
            status: "verified",
            block_index: block.index,
            blockchain_hash: hash_block(&block),
            proof: block.proof,
            elapsed_ms: started.elapsed().as_millis() as u64,
            transaction: block.transactions.last().cloned(),
        })
    }

    /// Transactions accepted but not yet sealed.
    pub async fn pending(&self) -> Vec<Transaction> {
        self.ledger.lock().await.pending().to_vec()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: f64,
    pub product_id: String,
    pub transaction_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedTransaction {
    pub status: &'static str,
    pub block_index: u64,
    pub blockchain_hash: String,
    pub proof: u64,
    pub elapsed_ms: u64,
    pub transaction: Option<Transaction>,
}

#[derive(Serialize)]
struct ChainResponse {
    chain: Vec<Block>,
    length: usize,
}

#[derive(Serialize)]
struct BlockResponse {
    block: Block,
    hash: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductHistory {
    product_id: String,
    transactions: Vec<ProductEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductEntry {
    block_index: u64,
    transaction: Transaction,
}

#[derive(Serialize)]
struct Validity {
    valid: bool,
    violation: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stats {
    blocks_mined: usize,
    pending_transactions: usize,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("sealing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Ledger(LedgerError::InvalidAmount(_)) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(LedgerError::UnknownBlock(_))
            | ApiError::Ledger(LedgerError::UnknownBlockHash(_)) => StatusCode::NOT_FOUND,
            ApiError::Ledger(LedgerError::SealCancelled) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Ledger(LedgerError::InvalidConfig(_)) | ApiError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/api/blockchain", get(get_chain))
        .route("/api/blockchain/valid", get(get_validity))
        .route("/api/blockchain/blocks/{index}", get(get_block))
        .route("/api/blockchain/hash/{hash}", get(get_block_by_hash))
        .route("/api/products/{id}/transactions", get(get_product_history))
        .route("/api/transactions", post(create_transaction))
        .route("/api/transactions/pending", get(get_pending))
        .route("/api/analytics/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until the state's shutdown token fires.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown_token();
    if let Ok(addr) = listener.local_addr() {
        info!("traceledger-node listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn get_chain(State(state): State<AppState>) -> Json<ChainResponse> {
    let ledger = state.ledger.lock().await;
    Json(ChainResponse {
        chain: ledger.export().to_vec(),
        length: ledger.length(),
    })
}

async fn get_validity(State(state): State<AppState>) -> Json<Validity> {
    let ledger = state.ledger.lock().await;
    let violation = ledger.verify_chain().err().map(|v| v.to_string());
    Json(Validity {
        valid: violation.is_none(),
        violation,
    })
}

async fn get_block(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<BlockResponse>, ApiError> {
    let ledger = state.ledger.lock().await;
    let block = ledger
        .block(index)
        .cloned()
        .ok_or(LedgerError::UnknownBlock(index))?;
    let hash = hash_block(&block);
    Ok(Json(BlockResponse { block, hash }))
}

async fn get_block_by_hash(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<BlockResponse>, ApiError> {
    let ledger = state.ledger.lock().await;
    let block = ledger
        .block_by_hash(&hash)
        .cloned()
        .ok_or_else(|| LedgerError::UnknownBlockHash(hash.clone()))?;
    Ok(Json(BlockResponse { block, hash }))
}

async fn get_product_history(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Json<ProductHistory> {
    let ledger = state.ledger.lock().await;
    let transactions = ledger
        .product_history(&product_id)
        .into_iter()
        .map(|(block_index, tx)| ProductEntry {
            block_index,
            transaction: tx.clone(),
        })
        .collect();
    Json(ProductHistory {
        product_id,
        transactions,
    })
}

async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<SealedTransaction>), ApiError> {
    let sealed = state.record_transaction(request).await?;
    Ok((StatusCode::CREATED, Json(sealed)))
}

async fn get_pending(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.pending().await)
}

async fn get_stats(State(state): State<AppState>) -> Json<Stats> {
    let ledger = state.ledger.lock().await;
    Json(Stats {
        blocks_mined: ledger.length(),
        pending_transactions: ledger.pending().len(),
    })
}
