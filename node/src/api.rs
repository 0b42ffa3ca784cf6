//! # HTTP + WebSocket API
//!
//! Builds the axum router for the node's query surface. Everything here
//! is a thin translation layer: parse the path, call the storage facade,
//! render hex. No ledger logic lives in handlers.
//!
//! ## Endpoints
//!
//! | Method | Path                    | Description                        |
//! |--------|-------------------------|------------------------------------|
//! | GET    | `/info`                 | Node summary: head, miner, counts  |
//! | GET    | `/repositories`         | All registered repository names    |
//! | GET    | `/repositories/:name`   | One repository record              |
//! | GET    | `/blocks/last`          | Chain head summary                 |
//! | GET    | `/blocks/:hash`         | Block summary by hash              |
//! | GET    | `/transactions/:hash`   | Confirmations and chain position   |
//! | POST   | `/transactions`         | Submit a signed envelope (hex)     |
//! | GET    | `/ws`                   | Live block feed                    |

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use moor_protocol::storage::DbError;
use moor_protocol::types::{hash_hex, Hash, EMPTY_HASH};
use moor_protocol::{BlockSummary, Envelope, LedgerDb, MinerState};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared state for all request handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<LedgerDb>,
    pub miner: MinerState,
    pub version: String,
}

/// Build the full router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/info", get(info_handler))
        .route("/repositories", get(list_repositories_handler))
        .route("/repositories/:name", get(get_repository_handler))
        .route("/blocks/last", get(last_block_handler))
        .route("/blocks/:hash", get(get_block_handler))
        .route("/transactions/:hash", get(get_transaction_handler))
        .route("/transactions", post(submit_transaction_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error translation
// ---------------------------------------------------------------------------

/// API-facing failure: status code plus a short message. Internal detail
/// stays in the logs.
struct ApiError(StatusCode, String);

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        warn!(error = %err, "storage error while serving request");
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError(StatusCode::NOT_FOUND, format!("{what} not found"))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, message.into())
}

/// Parse a 64-char lowercase hex ledger hash from a path segment.
fn parse_hash(hex_str: &str) -> Result<Hash, ApiError> {
    let bytes = hex::decode(hex_str).map_err(|_| bad_request("malformed hash"))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| bad_request("hash must be 32 bytes"))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct InfoResponse {
    version: String,
    miner_status: String,
    last_block: Option<String>,
    repositories: usize,
    pending_transactions: usize,
}

async fn info_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(InfoResponse {
        version: state.version.clone(),
        miner_status: state.miner.status().to_string(),
        last_block: state.db.get_last_block_hash()?.map(|h| hash_hex(&h)),
        repositories: state.db.list_repositories()?.len(),
        pending_transactions: state.db.list_pending_transactions()?.len(),
    }))
}

#[derive(Serialize)]
struct RepositoryView {
    name: String,
    status: String,
    name_allocation_tx: String,
}

async fn list_repositories_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut repositories = Vec::new();
    for name in state.db.list_repositories()? {
        if let Some(repo) = state.db.get_repository(&name)? {
            repositories.push(RepositoryView {
                name: repo.name,
                status: repo.status.to_string(),
                name_allocation_tx: hash_hex(&repo.name_allocation_tx),
            });
        }
    }
    Ok(Json(serde_json::json!({ "repositories": repositories })))
}

async fn get_repository_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state
        .db
        .get_repository(&name)?
        .ok_or_else(|| not_found("repository"))?;
    Ok(Json(RepositoryView {
        name: repo.name,
        status: repo.status.to_string(),
        name_allocation_tx: hash_hex(&repo.name_allocation_tx),
    }))
}

async fn last_block_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let block = state.db.get_last_block()?.ok_or_else(|| not_found("block"))?;
    Ok(Json(BlockSummary::from(&block)))
}

async fn get_block_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hash = parse_hash(&hash)?;
    let block = state.db.get_block(&hash)?.ok_or_else(|| not_found("block"))?;
    Ok(Json(BlockSummary::from(&block)))
}

#[derive(Serialize)]
struct TransactionView {
    hash: String,
    confirmations: usize,
    block: Option<String>,
    next_transaction: Option<String>,
    pending: bool,
}

async fn get_transaction_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hash = parse_hash(&hash)?;
    let block = state.db.get_transaction_block(&hash)?;
    let pending = state.db.get_transaction(&hash)?.is_some();
    if block.is_none() && !pending {
        return Err(not_found("transaction"));
    }

    let next = state.db.get_next_transaction_hash(&hash)?;
    Ok(Json(TransactionView {
        hash: hash_hex(&hash),
        confirmations: state.db.get_transaction_confirmations(&hash)?,
        block: block.map(|b| hash_hex(&b.hash())),
        next_transaction: (next != EMPTY_HASH).then(|| hash_hex(&next)),
        pending,
    }))
}

#[derive(Deserialize)]
struct SubmitTransactionRequest {
    /// Hex of the envelope's canonical binary encoding.
    envelope: String,
}

async fn submit_transaction_handler(
    State(state): State<AppState>,
    Json(request): Json<SubmitTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = hex::decode(&request.envelope).map_err(|_| bad_request("malformed hex"))?;
    let envelope = Envelope::decode(&bytes).map_err(|err| bad_request(err.to_string()))?;

    if !envelope.transaction.valid() {
        return Err(bad_request("invalid transaction"));
    }
    match envelope.verify() {
        Ok(true) => {}
        Ok(false) => return Err(bad_request("invalid signature")),
        Err(err) => return Err(bad_request(err.to_string())),
    }

    state.db.put_transaction(&envelope)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "hash": hash_hex(&envelope.hash()) })),
    ))
}

// ---------------------------------------------------------------------------
// WebSocket block feed
// ---------------------------------------------------------------------------

async fn ws_handler(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| stream_blocks(socket, state))
}

/// Forward confirmed-block summaries to one WebSocket client until it
/// hangs up. A lagging client skips the blocks it missed.
async fn stream_blocks(mut socket: WebSocket, state: AppState) {
    let mut blocks = state.db.events().subscribe_blocks();
    loop {
        match blocks.recv().await {
            Ok(block) => {
                let summary = BlockSummary::from(&block);
                let Ok(encoded) = serde_json::to_string(&summary) else {
                    continue;
                };
                if socket.send(Message::Text(encoded)).await.is_err() {
                    debug!("websocket subscriber disconnected");
                    return;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                debug!(missed, "websocket subscriber lagged, skipping ahead");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}
