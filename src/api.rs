//! HTTP routes exposing the ledger's boundary operations.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::crypto::mac;
use crate::error::LedgerError;
use crate::ledger::{ActionKind, ContractRules, ContractStatus};
use crate::service::TenderLedger;

pub type AppState = Arc<TenderLedger>;

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            LedgerError::ConcurrentAppendConflict { .. } => StatusCode::CONFLICT,
            LedgerError::MiningTimeout { .. } | LedgerError::MiningCancelled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub actor: String,
    pub details: serde_json::Value,
    #[serde(default)]
    pub content_reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub index: u64,
    pub digest: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateContractRequest {
    pub actor: String,
    #[serde(default)]
    pub rules: ContractRules,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub actor: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub data: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifySignatureRequest {
    pub data: String,
    pub signature: String,
    pub key: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/chain/validate", get(validate_chain))
        .route("/tenders/:entity_id/submissions", post(record_submission))
        .route("/tenders/:entity_id/documents", post(record_document_upload))
        .route("/tenders/:entity_id/awards", post(record_award))
        .route(
            "/tenders/:entity_id/contracts",
            get(list_contracts).post(create_contract),
        )
        .route(
            "/tenders/:entity_id/contracts/:contract_id/status",
            post(change_contract_status),
        )
        .route("/tenders/:entity_id/verify", get(verify_entity))
        .route("/tenders/:entity_id/timeline", get(timeline))
        .route("/signatures/sign", post(sign))
        .route("/signatures/verify", post(verify_signature))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "tender-ledger",
        "timestamp": chrono::Utc::now()
    }))
}

async fn record(
    state: AppState,
    entity_id: String,
    kind: ActionKind,
    request: RecordRequest,
) -> Result<(StatusCode, Json<RecordResponse>), LedgerError> {
    let block = state
        .record_event(
            &entity_id,
            kind,
            request.details,
            &request.actor,
            request.content_reference,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RecordResponse {
            index: block.index,
            digest: block.digest,
        }),
    ))
}

async fn record_submission(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(request): Json<RecordRequest>,
) -> Result<(StatusCode, Json<RecordResponse>), LedgerError> {
    record(state, entity_id, ActionKind::Submission, request).await
}

async fn record_document_upload(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(request): Json<RecordRequest>,
) -> Result<(StatusCode, Json<RecordResponse>), LedgerError> {
    record(state, entity_id, ActionKind::DocumentUpload, request).await
}

async fn record_award(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(request): Json<RecordRequest>,
) -> Result<(StatusCode, Json<RecordResponse>), LedgerError> {
    record(state, entity_id, ActionKind::Award, request).await
}

async fn create_contract(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(request): Json<CreateContractRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let contract = state
        .create_contract(&entity_id, request.rules, &request.actor)
        .await?;
    Ok((StatusCode::CREATED, Json(contract)))
}

async fn list_contracts(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> impl IntoResponse {
    Json(state.contracts(&entity_id).await)
}

async fn change_contract_status(
    State(state): State<AppState>,
    Path((entity_id, contract_id)): Path<(String, String)>,
    Json(request): Json<StatusChangeRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let status: ContractStatus = request.status.parse()?;
    let contract = state
        .change_contract_status(&entity_id, &contract_id, status, request.reason, &request.actor)
        .await?;
    Ok(Json(contract))
}

async fn verify_entity(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> impl IntoResponse {
    Json(state.verify(&entity_id).await)
}

async fn timeline(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> impl IntoResponse {
    Json(state.timeline(&entity_id).await)
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.stats().await)
}

async fn validate_chain(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.validate_chain().await)
}

async fn sign(Json(request): Json<SignRequest>) -> Json<serde_json::Value> {
    let signature = mac::sign(request.data.as_bytes(), request.key.as_bytes());
    Json(serde_json::json!({ "signature": signature }))
}

async fn verify_signature(Json(request): Json<VerifySignatureRequest>) -> Json<serde_json::Value> {
    let valid = mac::verify(
        request.data.as_bytes(),
        &request.signature,
        request.key.as_bytes(),
    );
    Json(serde_json::json!({ "valid": valid }))
}
