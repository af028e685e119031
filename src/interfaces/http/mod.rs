//! HTTP surface: single transfers, batches and status lookups.
//!
//! ```text
//! POST /transfer        body: TransferRequest     header: Idempotency-Key
//! POST /transfer/batch  body: [TransferRequest]   header: Idempotency-Key
//! GET  /transfer/{id}
//! ```

pub mod error;

use crate::application::batch::{BatchDispatcher, BatchItemResult};
use crate::application::orchestrator::TransferOrchestrator;
use crate::domain::transfer::{TransferOutcome, TransferRecord, TransferRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use error::ApiError;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Instrument, info_span};
use uuid::Uuid;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<TransferOrchestrator>,
    dispatcher: BatchDispatcher,
}

impl AppState {
    pub fn new(orchestrator: Arc<TransferOrchestrator>) -> Self {
        Self {
            dispatcher: BatchDispatcher::new(orchestrator.clone()),
            orchestrator,
        }
    }
}

/// One entry of a batch reply: either the item's outcome or why it was rejected.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchItemReply {
    Outcome(TransferOutcome),
    Rejected { error: String, message: String },
}

impl From<BatchItemResult> for BatchItemReply {
    fn from(result: BatchItemResult) -> Self {
        match result {
            Ok(outcome) => BatchItemReply::Outcome(outcome),
            Err(e) => {
                let rejection = ApiError::from(e);
                BatchItemReply::Rejected {
                    error: rejection.reason().to_string(),
                    message: rejection.message().to_string(),
                }
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/transfer", post(create_transfer))
        .route("/transfer/batch", post(create_batch))
        .route("/transfer/{id}", get(get_transfer))
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}

/// Serves the API on `listener` until the server fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

async fn create_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferOutcome>, ApiError> {
    let key = idempotency_key(&headers)?;
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let outcome = state.orchestrator.execute(&request, &key).await?;
    Ok(Json(outcome))
}

async fn create_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Vec<TransferRequest>>, JsonRejection>,
) -> Result<Json<Vec<BatchItemReply>>, ApiError> {
    let key = idempotency_key(&headers)?;
    let Json(requests) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let results = state.dispatcher.execute_batch(requests, &key).await?;
    Ok(Json(results.into_iter().map(BatchItemReply::from).collect()))
}

async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
) -> Result<Json<TransferRecord>, ApiError> {
    let record = state.orchestrator.lookup(&transfer_id).await?;
    Ok(Json(record))
}

fn idempotency_key(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Idempotency-Key header is required"))
}

/// Tags each request with an id taken from `X-Request-Id` or freshly generated, runs it inside a
/// span carrying that id and echoes the id on the response.
async fn request_id(request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path()
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}
