//! Driven Ports (SPI - Outbound Dependencies)
//!
//! The engine reaches the ledger, external data sources, peers and the clock
//! only through these traits.

use crate::domain::{Millis, OraclePayload};
use crate::error::{FetchError, OracleResult};
use async_trait::async_trait;
use reqwest::Url;
use shared_crypto::Secp256k1PublicKey;
use shared_types::{Hash, OracleRequest, Transaction};

/// Ledger collaborator.
///
/// All reads reflect the latest persisted state; the authorized oracle set
/// can change between calls.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Current authorized oracle signers.
    async fn validator_set(&self) -> OracleResult<Vec<Secp256k1PublicKey>>;

    /// Request descriptor, `None` if the ledger does not know it.
    async fn get_request(&self, request_id: &Hash) -> OracleResult<Option<OracleRequest>>;

    /// Dry-run `tx` and return its system fee.
    ///
    /// Fails with `SimulationFailed` if execution does not complete.
    async fn simulate_and_fee(&self, tx: &Transaction) -> OracleResult<u64>;

    /// Submit a fully witnessed transaction.
    async fn relay(&self, tx: Transaction) -> OracleResult<()>;

    /// Network fee rate per transaction byte.
    async fn fee_per_byte(&self) -> OracleResult<u64>;

    /// Height of the latest persisted block.
    async fn current_height(&self) -> OracleResult<u32>;
}

/// Raw fetch for one URL scheme.
///
/// Filtering and cost accounting happen in the caller.
#[async_trait]
pub trait OracleProtocol: Send + Sync {
    /// Retrieve the resource body.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Gossip egress.
///
/// Delivery is best-effort: implementations must not block on slow peers
/// and must not report per-peer failures to the caller.
pub trait PeerBroadcaster: Send + Sync {
    /// Send `payload` to every known peer.
    fn broadcast(&self, payload: &OraclePayload);
}

/// Time source abstraction.
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now(&self) -> Millis;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Millis {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Millis
    }
}
