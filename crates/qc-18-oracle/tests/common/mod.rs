//! Shared fixtures for the oracle integration tests.
//!
//! Several engines share one [`SharedLedger`]; each engine's outgoing
//! payloads land in its own [`Outbox`] and the test decides when (and in
//! which order) to deliver them to the other engines.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use qc_18_oracle::{
    FetchError, LedgerGateway, Millis, OracleConfig, OracleError, OraclePayload, OracleProtocol,
    OracleResult, OracleService, PeerBroadcaster, ProtocolRegistry, TimeSource,
};
use reqwest::Url;
use shared_crypto::{Secp256k1KeyPair, Secp256k1PublicKey};
use shared_types::{Hash, OracleRequest, RequestStatus, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

pub const REQUEST_ID: Hash = [0x42; 32];

pub type Engine = OracleService<SharedLedger, Outbox>;

/// Install a fmt subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn keypair(seed: u8) -> Secp256k1KeyPair {
    Secp256k1KeyPair::from_bytes([seed; 32]).expect("non-zero seed")
}

pub fn public_keys(seeds: &[u8]) -> Vec<Secp256k1PublicKey> {
    seeds.iter().map(|seed| keypair(*seed).public_key()).collect()
}

// =============================================================================
// LEDGER
// =============================================================================

pub struct SharedLedger {
    validators: RwLock<Vec<Secp256k1PublicKey>>,
    requests: RwLock<HashMap<Hash, OracleRequest>>,
    relayed: Mutex<Vec<Transaction>>,
}

impl SharedLedger {
    pub fn new(validators: Vec<Secp256k1PublicKey>) -> Arc<Self> {
        let ledger = Self {
            validators: RwLock::new(validators),
            requests: RwLock::new(HashMap::new()),
            relayed: Mutex::new(Vec::new()),
        };
        ledger.requests.write().insert(
            REQUEST_ID,
            OracleRequest::new(REQUEST_ID, "https://prices.example/btc", Some("$.usd".into())),
        );
        Arc::new(ledger)
    }

    pub fn request(&self) -> OracleRequest {
        self.requests.read()[&REQUEST_ID].clone()
    }

    pub fn set_validators(&self, validators: Vec<Secp256k1PublicKey>) {
        *self.validators.write() = validators;
    }

    pub fn finish(&self, request_id: &Hash) {
        if let Some(request) = self.requests.write().get_mut(request_id) {
            request.status = RequestStatus::Ready;
        }
    }

    pub fn relayed(&self) -> Vec<Transaction> {
        self.relayed.lock().clone()
    }
}

#[async_trait]
impl LedgerGateway for SharedLedger {
    async fn validator_set(&self) -> OracleResult<Vec<Secp256k1PublicKey>> {
        Ok(self.validators.read().clone())
    }

    async fn get_request(&self, request_id: &Hash) -> OracleResult<Option<OracleRequest>> {
        Ok(self.requests.read().get(request_id).cloned())
    }

    async fn simulate_and_fee(&self, tx: &Transaction) -> OracleResult<u64> {
        if tx.script.is_empty() {
            return Err(OracleError::SimulationFailed {
                reason: "empty script".into(),
            });
        }
        Ok(1_000_000)
    }

    async fn relay(&self, tx: Transaction) -> OracleResult<()> {
        self.relayed.lock().push(tx);
        Ok(())
    }

    async fn fee_per_byte(&self) -> OracleResult<u64> {
        Ok(1_000)
    }

    async fn current_height(&self) -> OracleResult<u32> {
        Ok(5_000)
    }
}

// =============================================================================
// PEERS, CLOCK, DATA SOURCE
// =============================================================================

/// Holds an engine's outgoing payloads until the test delivers them.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<OraclePayload>>,
}

impl Outbox {
    pub fn sent(&self) -> Vec<OraclePayload> {
        self.sent.lock().clone()
    }
}

impl PeerBroadcaster for Outbox {
    fn broadcast(&self, payload: &OraclePayload) {
        self.sent.lock().push(payload.clone());
    }
}

#[derive(Default)]
pub struct Clock {
    now: AtomicU64,
}

impl Clock {
    pub fn advance(&self, millis: Millis) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeSource for Clock {
    fn now(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Price feed answering every URL with the same document.
pub struct PriceFeed;

#[async_trait]
impl OracleProtocol for PriceFeed {
    async fn fetch(&self, _url: &Url) -> Result<Vec<u8>, FetchError> {
        Ok(br#"{"usd":64000,"eur":59000}"#.to_vec())
    }
}

// =============================================================================
// NODES
// =============================================================================

pub struct Node {
    pub engine: Arc<Engine>,
    pub outbox: Arc<Outbox>,
    pub seed: u8,
}

/// Build and start one engine per seed, all sharing `ledger` and `clock`.
pub async fn start_nodes(
    seeds: &[u8],
    ledger: &Arc<SharedLedger>,
    clock: &Arc<Clock>,
    config: OracleConfig,
) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(seeds.len());
    for &seed in seeds {
        let outbox = Arc::new(Outbox::default());
        let mut protocols = ProtocolRegistry::new();
        protocols.register("https", Arc::new(PriceFeed));

        let engine = Arc::new(OracleService::with_time_source(
            config.clone(),
            Arc::clone(ledger),
            Arc::clone(&outbox),
            protocols,
            clock.clone(),
        ));
        engine
            .start(vec![keypair(seed)])
            .await
            .expect("engine starts");
        nodes.push(Node {
            engine,
            outbox,
            seed,
        });
    }
    nodes
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
