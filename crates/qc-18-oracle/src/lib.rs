//! # Oracle Response Aggregation Subsystem
//!
//! **Subsystem ID:** 18
//!
//! ## Purpose
//!
//! Serves external-data requests recorded on the ledger. Every oracle node
//! fetches the resource, builds the same candidate response transaction and
//! signs it; partial signatures are gossiped between nodes and, once a
//! quorum of the authorized oracle set has signed, the combined multi-sig
//! witness is attached and the transaction relayed.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Quorum is `N - (N-1)/3` of the current oracle set | `shared_crypto::quorum_size` |
//! | Per-signer last-write-wins by strictly newer timestamp | `domain/response.rs` - `add()` |
//! | Stale signers pruned before every merge | `domain/task.rs` - `merge()` |
//! | No finalization without a local candidate | `domain/task.rs` - `merge()` |
//! | Finalization happens at most once per task | `domain/task.rs` - `TaskState` |
//! | Unfinished tasks abandoned after the TTL | `domain/pending.rs` - `evict_older_than()` |
//! | Wire payload carries exactly one witness | `domain/payload.rs` - `decode()` |
//!
//! ## Request Lifecycle
//!
//! ```text
//! [ledger request] ──submit──→ queue ──worker──→ fetch → candidate tx → simulate
//!                                                                │
//!                                                   sign → merge + broadcast
//!                                                                │
//! [peer payload] ──verify──→ merge ──quorum──→ witness → relay ──┘
//! ```
//!
//! ## Outbound Dependencies
//!
//! | Collaborator | Trait | Purpose |
//! |--------------|-------|---------|
//! | Ledger | `LedgerGateway` | Oracle set, request status, simulation, relay, fee rate |
//! | External sources | `OracleProtocol` | Resource fetch per URL scheme |
//! | Peers | `PeerBroadcaster` | Gossip egress of signed payloads |
//! | Clock | `TimeSource` | Response timestamps and TTL |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/protocols - HTTP(S) fetch, scheme registry            │
//! │  adapters/broadcaster.rs - HTTP gossip egress                   │
//! │  adapters/rpc.rs - axum ingress (peer body, JSON-RPC)           │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - OracleApi trait                           │
//! │  ports/outbound.rs - LedgerGateway, OracleProtocol,            │
//! │                      PeerBroadcaster, TimeSource               │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/response.rs    - ResponseItem, ResponseCollection       │
//! │  domain/context.rs     - SignatureContext (witness assembly)    │
//! │  domain/task.rs        - AggregationTask, merge algorithm       │
//! │  domain/pending.rs     - PendingTaskTable                       │
//! │  domain/payload.rs     - OraclePayload wire format              │
//! │  domain/transaction.rs - candidate response transaction         │
//! │  domain/filter.rs      - JSONPath filter                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wiring
//!
//! ```rust,ignore
//! let config = OracleConfig::from_env()?;
//! let protocols = ProtocolRegistry::with_http(config.fetch.clone())?;
//! let broadcaster = Arc::new(HttpBroadcaster::new(&config.peers, Duration::from_secs(5))?);
//! let service = Arc::new(OracleService::new(config, ledger, broadcaster, protocols));
//!
//! service.start(oracle_keys).await?;
//! let app = router(service.clone());
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{router, HttpBroadcaster, HttpProtocol, PeerMessage, ProtocolRegistry};
pub use config::{BackpressurePolicy, FetchConfig, OracleConfig};
pub use domain::*;
pub use error::{FetchError, OracleError, OracleResult};
pub use ports::{
    LedgerGateway, OracleApi, OracleProtocol, PeerBroadcaster, SystemTimeSource, TimeSource,
};
pub use service::OracleService;
