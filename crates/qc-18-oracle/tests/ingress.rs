//! # Ingress Tests
//!
//! Wire-format and HTTP ingress checks against a running engine.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::*;
use qc_18_oracle::adapters::rpc::{codes, SUBMIT_ACK, SUBMIT_METHOD};
use qc_18_oracle::{router, OracleApi, OracleConfig, OracleError, OraclePayload};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn two_node_setup() -> (Arc<SharedLedger>, Vec<Node>) {
    init_tracing();
    let ledger = SharedLedger::new(public_keys(&[1, 2, 3, 4]));
    let clock = Arc::new(Clock::default());
    let nodes = start_nodes(&[1, 2], &ledger, &clock, OracleConfig::default()).await;

    nodes[1].engine.submit_request(ledger.request()).await.unwrap();
    wait_until(|| nodes[1].outbox.sent().len() == 1).await;
    (ledger, nodes)
}

async fn rpc(node: &Node, body: Value) -> Value {
    let response = router(node.engine.clone())
        .oneshot(
            Request::post("/rpc")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_two_witnesses_rejected_before_merge() {
    let (_, nodes) = two_node_setup().await;
    let payload = nodes[1].outbox.sent()[0].clone();

    let mut bytes = payload.encode();
    let count_at = 33 + 32 + 64;
    assert_eq!(bytes[count_at], 1);
    bytes[count_at] = 2;
    let witness = bytes[count_at + 1..].to_vec();
    bytes.extend_from_slice(&witness);

    assert!(matches!(
        OraclePayload::decode(&bytes),
        Err(OracleError::Format { .. })
    ));

    let reply = rpc(
        &nodes[0],
        json!({"jsonrpc": "2.0", "id": 1, "method": SUBMIT_METHOD, "params": [hex::encode(&bytes)]}),
    )
    .await;
    assert_eq!(reply["error"]["code"], codes::INVALID_PARAMS);
    assert_eq!(nodes[0].engine.pending_tasks(), 0);
}

#[tokio::test]
async fn test_rpc_submission_reaches_engine() {
    let (_, nodes) = two_node_setup().await;
    let payload = nodes[1].outbox.sent()[0].clone();

    let reply = rpc(
        &nodes[0],
        json!({"jsonrpc": "2.0", "id": "a", "method": SUBMIT_METHOD, "params": [payload.to_hex()]}),
    )
    .await;
    assert_eq!(reply["result"], SUBMIT_ACK);
    assert_eq!(nodes[0].engine.pending_tasks(), 1);
}

#[tokio::test]
async fn test_rpc_reports_unauthorized_signer() {
    let (_, nodes) = two_node_setup().await;
    let outsider = keypair(9);
    let payload = OraclePayload::sign(&outsider, REQUEST_ID, outsider.sign(b"candidate"));

    let reply = rpc(
        &nodes[0],
        json!({"jsonrpc": "2.0", "id": 2, "method": SUBMIT_METHOD, "params": [payload.to_hex()]}),
    )
    .await;
    assert_eq!(reply["error"]["code"], codes::SUBMISSION_FAILED);
    assert!(reply["error"]["message"]
        .as_str()
        .unwrap()
        .contains("not an authorized oracle"));
}

#[tokio::test]
async fn test_peer_broadcast_body_merged() {
    let (_, nodes) = two_node_setup().await;
    let payload = nodes[1].outbox.sent()[0].clone();

    let response = router(nodes[0].engine.clone())
        .oneshot(
            Request::post("/")
                .header("content-type", "application/json")
                .body(Body::from(json!([{ "data": payload.to_hex() }]).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(nodes[0].engine.pending_tasks(), 1);
}
