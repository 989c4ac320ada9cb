//! # HTTP Ingress
//!
//! axum router accepting partial responses from peers.
//!
//! | Route | Body | Reply |
//! |-------|------|-------|
//! | `POST /` | `[{"data": "<hex>"}, ...]` (peer broadcast) | `200`, empty |
//! | `POST /rpc` | JSON-RPC 2.0 `submitoracleresponse` with `params: ["<hex>"]` | result or error object |

use super::broadcaster::PeerMessage;
use crate::domain::OraclePayload;
use crate::error::OracleError;
use crate::ports::inbound::OracleApi;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// JSON-RPC method name for payload submission.
pub const SUBMIT_METHOD: &str = "submitoracleresponse";

/// Result returned for an accepted submission.
pub const SUBMIT_ACK: &str = "Signature has received";

/// JSON-RPC error codes.
pub mod codes {
    /// Payload rejected by the engine.
    pub const SUBMISSION_FAILED: i64 = -100;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Params missing or undecodable.
    pub const INVALID_PARAMS: i64 = -32602;
}

type ApiState = Arc<dyn OracleApi>;

/// JSON-RPC request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Build the ingress router over `api`.
pub fn router(api: Arc<dyn OracleApi>) -> Router {
    Router::new()
        .route("/", post(handle_peer_messages))
        .route("/rpc", post(handle_rpc))
        .with_state(api)
}

async fn handle_peer_messages(
    State(api): State<ApiState>,
    Json(messages): Json<Vec<PeerMessage>>,
) -> StatusCode {
    for message in messages {
        let result = match OraclePayload::from_hex(&message.data) {
            Ok(payload) => api.on_peer_payload(payload).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            debug!(reason = %err, "[qc-18] Peer message discarded");
        }
    }
    StatusCode::OK
}

async fn handle_rpc(
    State(api): State<ApiState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<Value> {
    let result = match request.method.as_str() {
        SUBMIT_METHOD => submit(&api, &request.params).await,
        other => Err(RpcError::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        )),
    };

    Json(match result {
        Ok(value) => json!({ "jsonrpc": "2.0", "id": request.id, "result": value }),
        Err(err) => json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": { "code": err.code, "message": err.message },
        }),
    })
}

async fn submit(api: &ApiState, params: &Value) -> Result<Value, RpcError> {
    let data = params
        .get(0)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::new(codes::INVALID_PARAMS, "expected [\"<hex payload>\"]"))?;

    let payload = OraclePayload::from_hex(data)
        .map_err(|err| RpcError::new(codes::INVALID_PARAMS, err.to_string()))?;

    match api.on_peer_payload(payload).await {
        Ok(()) => Ok(Value::String(SUBMIT_ACK.to_string())),
        Err(err @ OracleError::Format { .. }) => {
            Err(RpcError::new(codes::INVALID_PARAMS, err.to_string()))
        }
        Err(err) => Err(RpcError::new(codes::SUBMISSION_FAILED, err.to_string())),
    }
}
