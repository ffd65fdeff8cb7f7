use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::LedgerError;
use crate::ledger::{EntryKind, Ledger};

type ApiResponse = (StatusCode, Json<Value>);

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub kind: EntryKind,
    #[serde(default)]
    pub reference_id: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub payload: Value,
}

pub fn router(ledger: Arc<Ledger>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ledger/entries", post(append_entry))
        .route("/ledger/history/:reference_id", get(history))
        .route("/ledger/verify/:reference_id", post(verify_entry))
        .route("/ledger/stats", get(stats))
        .route("/ledger/validate", get(validate))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(ledger)
}

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::ConcurrentAppend { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::ValidationError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: LedgerError) -> ApiResponse {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Ledger request failed: {}", err);
    } else {
        warn!("Ledger request rejected: {}", err);
    }
    (
        status,
        Json(json!({
            "error": err.to_string(),
            "retryable": err.is_retryable(),
        })),
    )
}

fn ok<T: serde::Serialize>(status: StatusCode, body: &T) -> ApiResponse {
    match serde_json::to_value(body) {
        Ok(value) => (status, Json(value)),
        Err(e) => error_response(e.into()),
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "fund-ledger",
        "timestamp": chrono::Utc::now()
    }))
}

async fn append_entry(
    State(ledger): State<Arc<Ledger>>,
    Json(request): Json<AppendRequest>,
) -> ApiResponse {
    if request.kind == EntryKind::Genesis {
        return error_response(LedgerError::ValidationError(
            "genesis entries are written by ledger initialization only".to_string(),
        ));
    }

    match ledger
        .append(request.kind, request.payload, request.reference_id)
        .await
    {
        Ok(receipt) => {
            info!("Appended {} as block {}", request.kind, receipt.block_number);
            ok(StatusCode::CREATED, &receipt)
        }
        Err(e) => error_response(e),
    }
}

async fn history(
    State(ledger): State<Arc<Ledger>>,
    Path(reference_id): Path<String>,
) -> ApiResponse {
    match ledger.get_history(&reference_id).await {
        Ok(records) => ok(
            StatusCode::OK,
            &json!({ "reference_id": reference_id, "entries": records }),
        ),
        Err(e) => error_response(e),
    }
}

async fn verify_entry(
    State(ledger): State<Arc<Ledger>>,
    Path(reference_id): Path<String>,
    Json(request): Json<VerifyRequest>,
) -> ApiResponse {
    match ledger
        .verify_entry_integrity(&reference_id, &request.payload)
        .await
    {
        Ok(status) => ok(
            StatusCode::OK,
            &json!({ "reference_id": reference_id, "status": status }),
        ),
        Err(e) => error_response(e),
    }
}

async fn stats(State(ledger): State<Arc<Ledger>>) -> ApiResponse {
    match ledger.get_chain_stats().await {
        Ok(stats) => ok(StatusCode::OK, &stats),
        Err(e) => error_response(e),
    }
}

async fn validate(State(ledger): State<Arc<Ledger>>) -> ApiResponse {
    match ledger.validate_chain().await {
        Ok(report) => ok(StatusCode::OK, &report),
        Err(e) => error_response(e),
    }
}
