//! HTTP surface tests driven through the router without a socket.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use tender_ledger::api;
use tender_ledger::ledger::digest_bytes;

mod common;
use common::*;

fn app() -> Router {
    api::router(Arc::new(test_ledger(1)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_record_and_query_tender() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/tenders/42/submissions",
        Some(json!({ "actor": "clerk", "details": { "bidder": "ACME", "amount_minor": 1000 } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["index"], 1);
    assert_eq!(body["digest"].as_str().unwrap().len(), 64);

    let (status, _) = send(
        &app,
        "POST",
        "/tenders/42/documents",
        Some(json!({
            "actor": "clerk",
            "details": { "file_name": "offer.pdf", "size_bytes": 10, "sha256": digest_bytes(b"offer") },
            "content_reference": "blob://offer.pdf"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/tenders/42/timeline", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_blocks"], 2);
    assert_eq!(body["integrity"], true);
    assert_eq!(body["entries"][1]["action_kind"], "document_upload");

    let (status, body) = send(&app, "GET", "/tenders/42/verify", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["audit_trail"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, "GET", "/stats", None).await;
    assert_eq!(body["total_blocks"], 3);
    assert_eq!(body["total_entities"], 1);
    assert_eq!(body["chain_integrity"], true);

    let (_, body) = send(&app, "GET", "/chain/validate", None).await;
    assert_eq!(body["is_valid"], true);
}

#[tokio::test]
async fn test_invalid_details_rejected() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/tenders/42/awards",
        Some(json!({ "actor": "board", "details": { "prize": "everything" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid payload"));

    let (_, body) = send(&app, "GET", "/stats", None).await;
    assert_eq!(body["total_blocks"], 1);
}

#[tokio::test]
async fn test_contract_routes() {
    let app = app();

    let (status, contract) = send(
        &app,
        "POST",
        "/tenders/42/contracts",
        Some(json!({
            "actor": "legal",
            "rules": { "eligibility": ["ISO 9001"], "required_documents": ["insurance"] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(contract["status"], "active");
    let contract_id = contract["contract_id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app,
        "POST",
        &format!("/tenders/42/contracts/{}/status", contract_id),
        Some(json!({ "actor": "legal", "status": "suspended", "reason": "audit" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "suspended");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/tenders/42/contracts/{}/status", contract_id),
        Some(json!({ "actor": "legal", "status": "vanished" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, contracts) = send(&app, "GET", "/tenders/42/contracts", None).await;
    assert_eq!(contracts.as_array().unwrap().len(), 1);
    assert_eq!(contracts[0]["status"], "suspended");
}

#[tokio::test]
async fn test_signature_routes() {
    let app = app();

    let (_, signed) = send(
        &app,
        "POST",
        "/signatures/sign",
        Some(json!({ "data": "award letter", "key": "secret" })),
    )
    .await;
    let signature = signed["signature"].as_str().unwrap().to_string();

    let (_, verified) = send(
        &app,
        "POST",
        "/signatures/verify",
        Some(json!({ "data": "award letter", "signature": signature, "key": "secret" })),
    )
    .await;
    assert_eq!(verified["valid"], true);

    let (_, verified) = send(
        &app,
        "POST",
        "/signatures/verify",
        Some(json!({ "data": "award letter", "signature": signature, "key": "other" })),
    )
    .await;
    assert_eq!(verified["valid"], false);
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
