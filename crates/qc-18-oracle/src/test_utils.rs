//! Test utilities for the oracle subsystem.
//!
//! Hand-written implementations of the outbound ports for deterministic
//! testing. Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```ignore
//! use qc_18_oracle::test_utils::ManualTimeSource;
//! use qc_18_oracle::TimeSource;
//!
//! let time = ManualTimeSource::new(1_000);
//! time.advance(500);
//! assert_eq!(time.now(), 1_500);
//! ```

use crate::domain::{build_response_transaction, Millis, OraclePayload};
use crate::error::{FetchError, OracleError, OracleResult};
use crate::ports::outbound::{LedgerGateway, OracleProtocol, PeerBroadcaster, TimeSource};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use shared_crypto::{MultiSigContract, Secp256k1KeyPair, Secp256k1PublicKey};
use shared_types::{Hash, OracleRequest, OracleResponseAttribute, RequestStatus, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Deterministic key pair derived from `seed` (must be non-zero).
pub fn keypair(seed: u8) -> Secp256k1KeyPair {
    Secp256k1KeyPair::from_bytes([seed; 32]).expect("non-zero seed is a valid scalar")
}

/// Key pairs for seeds `1..=n`.
pub fn keypairs(n: usize) -> Vec<Secp256k1KeyPair> {
    (1..=n as u8).map(keypair).collect()
}

/// Unwitnessed candidate for `request_id`, built against a 4-key contract.
pub fn sample_transaction(request_id: Hash) -> Transaction {
    let keys: Vec<_> = keypairs(4).iter().map(|p| p.public_key()).collect();
    let contract = MultiSigContract::with_quorum(&keys).expect("non-empty key set");
    build_response_transaction(
        OracleResponseAttribute::success(request_id, b"[1]".to_vec(), 0),
        &contract,
        100,
    )
}

// =============================================================================
// LEDGER
// =============================================================================

/// In-memory ledger.
pub struct MockLedger {
    validators: RwLock<Vec<Secp256k1PublicKey>>,
    requests: RwLock<HashMap<Hash, OracleRequest>>,
    relayed: Mutex<Vec<Transaction>>,
    fail_simulation: AtomicBool,
    fee_per_byte: u64,
    system_fee: u64,
    height: u32,
}

impl MockLedger {
    /// Ledger whose oracle set is `validators`.
    pub fn new(validators: Vec<Secp256k1PublicKey>) -> Self {
        Self {
            validators: RwLock::new(validators),
            requests: RwLock::new(HashMap::new()),
            relayed: Mutex::new(Vec::new()),
            fail_simulation: AtomicBool::new(false),
            fee_per_byte: 1_000,
            system_fee: 10_000_000,
            height: 100,
        }
    }

    /// Record a pending request.
    pub fn add_request(&self, request: OracleRequest) {
        self.requests.write().insert(request.request_id, request);
    }

    /// Mark a request as answered.
    pub fn finish_request(&self, request_id: &Hash) {
        if let Some(request) = self.requests.write().get_mut(request_id) {
            request.status = RequestStatus::Ready;
        }
    }

    /// Replace the oracle set.
    pub fn set_validators(&self, validators: Vec<Secp256k1PublicKey>) {
        *self.validators.write() = validators;
    }

    /// Make every subsequent simulation fail.
    pub fn set_fail_simulation(&self, fail: bool) {
        self.fail_simulation.store(fail, Ordering::SeqCst);
    }

    /// Transactions relayed so far.
    pub fn relayed(&self) -> Vec<Transaction> {
        self.relayed.lock().clone()
    }

    /// System fee charged by every successful simulation.
    pub fn system_fee(&self) -> u64 {
        self.system_fee
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn validator_set(&self) -> OracleResult<Vec<Secp256k1PublicKey>> {
        Ok(self.validators.read().clone())
    }

    async fn get_request(&self, request_id: &Hash) -> OracleResult<Option<OracleRequest>> {
        Ok(self.requests.read().get(request_id).cloned())
    }

    async fn simulate_and_fee(&self, _tx: &Transaction) -> OracleResult<u64> {
        if self.fail_simulation.load(Ordering::SeqCst) {
            return Err(OracleError::SimulationFailed {
                reason: "execution faulted".to_string(),
            });
        }
        Ok(self.system_fee)
    }

    async fn relay(&self, tx: Transaction) -> OracleResult<()> {
        self.relayed.lock().push(tx);
        Ok(())
    }

    async fn fee_per_byte(&self) -> OracleResult<u64> {
        Ok(self.fee_per_byte)
    }

    async fn current_height(&self) -> OracleResult<u32> {
        Ok(self.height)
    }
}

// =============================================================================
// BROADCASTER
// =============================================================================

/// Broadcaster that records payloads instead of sending them.
#[derive(Default)]
pub struct RecordingBroadcaster {
    payloads: Mutex<Vec<OraclePayload>>,
}

impl RecordingBroadcaster {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads broadcast so far.
    pub fn payloads(&self) -> Vec<OraclePayload> {
        self.payloads.lock().clone()
    }

    /// Remove and return recorded payloads.
    pub fn take(&self) -> Vec<OraclePayload> {
        std::mem::take(&mut *self.payloads.lock())
    }
}

impl PeerBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, payload: &OraclePayload) {
        self.payloads.lock().push(payload.clone());
    }
}

// =============================================================================
// TIME
// =============================================================================

/// Clock advanced by hand.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: AtomicU64,
}

impl ManualTimeSource {
    /// Clock starting at `start`.
    pub fn new(start: Millis) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move forward by `millis`.
    pub fn advance(&self, millis: Millis) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump to `millis`.
    pub fn set(&self, millis: Millis) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

// =============================================================================
// PROTOCOL
// =============================================================================

/// Protocol answering every URL with the same outcome.
pub struct StaticProtocol {
    outcome: Result<Vec<u8>, FetchError>,
    calls: AtomicUsize,
}

impl StaticProtocol {
    /// Always returns `body`.
    pub fn ok(body: &str) -> Self {
        Self {
            outcome: Ok(body.as_bytes().to_vec()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with `err`.
    pub fn failing(err: FetchError) -> Self {
        Self {
            outcome: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetches served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OracleProtocol for StaticProtocol {
    async fn fetch(&self, _url: &Url) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
