//! Driving Ports (API - Inbound)

use crate::domain::OraclePayload;
use crate::error::OracleResult;
use async_trait::async_trait;
use shared_types::OracleRequest;

/// Oracle engine API.
///
/// Used by the ledger-persistence hook (new requests) and by the HTTP
/// ingress (peer payloads).
#[async_trait]
pub trait OracleApi: Send + Sync {
    /// Queue a newly persisted request for processing.
    ///
    /// Honours the configured backpressure policy when the queue is full.
    async fn submit_request(&self, request: OracleRequest) -> OracleResult<()>;

    /// Verify a peer's partial response and merge it.
    async fn on_peer_payload(&self, payload: OraclePayload) -> OracleResult<()>;

    /// Whether the engine is running.
    fn is_started(&self) -> bool;

    /// Number of in-flight aggregation tasks.
    fn pending_tasks(&self) -> usize;
}
