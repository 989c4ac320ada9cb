//! # Oracle Service
//!
//! Wires the worker pool, the pending task table, gossip ingress and the
//! eviction timer together.
//!
//! ## Runtime
//!
//! ```text
//! submit_request ──→ [bounded queue] ──→ worker × N ──→ fetch → build → simulate
//!                                                           │
//!                                              sign (per local account)
//!                                                   │              │
//! on_peer_payload ──→ verify ──→ merge ←────────────┘       broadcast to peers
//!                                  │
//!                          quorum reached → relay
//!
//! sweep timer ──→ evict tasks older than the TTL
//! ```
//!
//! ## Lifecycle
//!
//! `start` and `stop` are guarded by an atomic flag: a second `start` fails
//! with `AlreadyStarted`, `stop` on a stopped service with `NotStarted`.
//! `stop` lets in-flight requests finish, joins the workers and the timer,
//! discards queued requests, clears the pending table and forgets the signer
//! accounts.

use crate::adapters::protocols::ProtocolRegistry;
use crate::config::{BackpressurePolicy, OracleConfig};
use crate::domain::{
    build_response_transaction, network_fee, MergeOutcome, Millis, OraclePayload,
    PendingTaskTable, ResponseItem, TaskSlot,
};
use crate::error::{OracleError, OracleResult};
use crate::metrics;
use crate::ports::inbound::OracleApi;
use crate::ports::outbound::{LedgerGateway, PeerBroadcaster, SystemTimeSource, TimeSource};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_crypto::{MultiSigContract, Secp256k1KeyPair, Secp256k1PublicKey};
use shared_types::{short_hex, Hash, OracleRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<OracleRequest>>>;

/// Background tasks owned by a running service.
struct Runtime {
    workers: Vec<JoinHandle<()>>,
    sweeper: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
    receiver: SharedReceiver,
}

/// State shared with the background tasks.
struct Inner<L, B> {
    config: OracleConfig,
    ledger: Arc<L>,
    broadcaster: Arc<B>,
    protocols: ProtocolRegistry,
    time: Arc<dyn TimeSource>,
    table: PendingTaskTable,
    signers: RwLock<Vec<Arc<Secp256k1KeyPair>>>,
    started: AtomicBool,
    queue: RwLock<Option<mpsc::Sender<OracleRequest>>>,
}

/// Oracle Response Aggregation Engine.
pub struct OracleService<L, B> {
    inner: Arc<Inner<L, B>>,
    runtime: Mutex<Option<Runtime>>,
}

impl<L, B> OracleService<L, B>
where
    L: LedgerGateway + 'static,
    B: PeerBroadcaster + 'static,
{
    /// Create a stopped service using the system clock.
    pub fn new(
        config: OracleConfig,
        ledger: Arc<L>,
        broadcaster: Arc<B>,
        protocols: ProtocolRegistry,
    ) -> Self {
        Self::with_time_source(
            config,
            ledger,
            broadcaster,
            protocols,
            Arc::new(SystemTimeSource),
        )
    }

    /// Create a stopped service reading time from `time`.
    pub fn with_time_source(
        config: OracleConfig,
        ledger: Arc<L>,
        broadcaster: Arc<B>,
        protocols: ProtocolRegistry,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let table = PendingTaskTable::new(config.max_pending_tasks);
        Self {
            inner: Arc::new(Inner {
                config,
                ledger,
                broadcaster,
                protocols,
                time,
                table,
                signers: RwLock::new(Vec::new()),
                started: AtomicBool::new(false),
                queue: RwLock::new(None),
            }),
            runtime: Mutex::new(None),
        }
    }

    /// Start workers and the eviction timer.
    ///
    /// Only keys in the current oracle set are kept. Fails without side
    /// effects on invalid configuration or when no key is authorized.
    pub async fn start(&self, keys: Vec<Secp256k1KeyPair>) -> OracleResult<()> {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(OracleError::AlreadyStarted);
        }

        if let Err(err) = self.launch(keys).await {
            self.inner.signers.write().clear();
            self.inner.started.store(false, Ordering::Release);
            error!(reason = %err, "[qc-18] Oracle service failed to start");
            return Err(err);
        }
        Ok(())
    }

    async fn launch(&self, keys: Vec<Secp256k1KeyPair>) -> OracleResult<()> {
        let config = &self.inner.config;
        config.validate()?;

        let validators = self.inner.ledger.validator_set().await?;
        let signers: Vec<Arc<Secp256k1KeyPair>> = keys
            .into_iter()
            .filter(|key| validators.contains(&key.public_key()))
            .map(Arc::new)
            .collect();
        if signers.is_empty() {
            return Err(OracleError::NoOracleAccounts);
        }
        let signer_count = signers.len();
        *self.inner.signers.write() = signers;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let (shutdown, _) = watch::channel(false);

        let workers = (0..config.worker_count)
            .map(|worker| {
                tokio::spawn(run_worker(
                    Arc::clone(&self.inner),
                    worker,
                    Arc::clone(&receiver),
                    shutdown.subscribe(),
                ))
            })
            .collect();
        let sweeper = tokio::spawn(run_sweeper(Arc::clone(&self.inner), shutdown.subscribe()));

        *self.inner.queue.write() = Some(sender);
        *self.runtime.lock() = Some(Runtime {
            workers,
            sweeper,
            shutdown,
            receiver,
        });

        info!(
            workers = config.worker_count,
            signers = signer_count,
            oracles = validators.len(),
            "[qc-18] Oracle service started"
        );
        Ok(())
    }

    /// Stop the service and release every task and credential.
    pub async fn stop(&self) -> OracleResult<()> {
        if !self.inner.started.load(Ordering::Acquire) {
            return Err(OracleError::NotStarted);
        }
        let Some(runtime) = self.runtime.lock().take() else {
            return Err(OracleError::NotStarted);
        };

        self.inner.queue.write().take();
        let _ = runtime.shutdown.send(true);

        for worker in runtime.workers {
            if let Err(err) = worker.await {
                warn!(reason = %err, "[qc-18] Worker terminated abnormally");
            }
        }
        if let Err(err) = runtime.sweeper.await {
            warn!(reason = %err, "[qc-18] Eviction timer terminated abnormally");
        }

        let discarded = {
            let mut receiver = runtime.receiver.lock().await;
            receiver.close();
            let mut count = 0usize;
            while receiver.try_recv().is_ok() {
                count += 1;
            }
            count
        };

        let abandoned = self.inner.table.len();
        self.inner.table.clear();
        self.inner.signers.write().clear();
        metrics::set_pending_tasks(0);
        self.inner.started.store(false, Ordering::Release);

        info!(discarded, abandoned, "[qc-18] Oracle service stopped");
        Ok(())
    }

    /// Requests waiting in the submission queue.
    pub fn queue_len(&self) -> usize {
        self.inner
            .queue
            .read()
            .as_ref()
            .map(|sender| self.inner.config.queue_capacity.saturating_sub(sender.capacity()))
            .unwrap_or(0)
    }

    /// Local signer accounts in use.
    pub fn signer_count(&self) -> usize {
        self.inner.signers.read().len()
    }

    /// Run the TTL sweep now. Returns the number of evicted tasks.
    pub fn evict_expired(&self) -> usize {
        self.inner.evict_expired()
    }

    /// Active configuration.
    pub fn config(&self) -> &OracleConfig {
        &self.inner.config
    }
}

#[async_trait]
impl<L, B> OracleApi for OracleService<L, B>
where
    L: LedgerGateway + 'static,
    B: PeerBroadcaster + 'static,
{
    async fn submit_request(&self, request: OracleRequest) -> OracleResult<()> {
        let sender = self
            .inner
            .queue
            .read()
            .clone()
            .ok_or(OracleError::NotStarted)?;

        match self.inner.config.backpressure {
            BackpressurePolicy::Reject => match sender.try_send(request) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(request)) => {
                    metrics::record_queue_rejection();
                    warn!(
                        request_id = %short_hex(&request.request_id),
                        "[qc-18] Submission queue full, request rejected"
                    );
                    Err(OracleError::QueueFull {
                        capacity: self.inner.config.queue_capacity,
                    })
                }
                Err(TrySendError::Closed(_)) => Err(OracleError::NotStarted),
            },
            BackpressurePolicy::Block => sender
                .send(request)
                .await
                .map_err(|_| OracleError::NotStarted),
        }
    }

    async fn on_peer_payload(&self, payload: OraclePayload) -> OracleResult<()> {
        let request_id = payload.request_id;
        let signer = payload.signer;

        match self.inner.accept_payload(payload).await {
            Ok(outcome) => {
                metrics::record_payload_accepted();
                debug!(
                    request_id = %short_hex(&request_id),
                    signer = %signer,
                    outcome = outcome_label(&outcome),
                    "[qc-18] Peer payload merged"
                );
                Ok(())
            }
            Err(err) => {
                metrics::record_payload_rejected(err.reason_label());
                warn!(
                    request_id = %short_hex(&request_id),
                    signer = %signer,
                    reason = %err,
                    "[qc-18] Peer payload rejected"
                );
                Err(err)
            }
        }
    }

    fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    fn pending_tasks(&self) -> usize {
        self.inner.table.len()
    }
}

impl<L, B> Drop for OracleService<L, B> {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            let _ = runtime.shutdown.send(true);
            runtime.sweeper.abort();
            for worker in runtime.workers {
                worker.abort();
            }
        }
    }
}

impl<L, B> Inner<L, B>
where
    L: LedgerGateway,
    B: PeerBroadcaster,
{
    /// Process one queued request; failures drop it.
    async fn process_request(&self, request: OracleRequest) {
        let request_id = request.request_id;
        match self.try_process(request).await {
            Ok(()) => metrics::record_request_processed(),
            Err(err) => {
                metrics::record_request_dropped(err.reason_label());
                warn!(
                    request_id = %short_hex(&request_id),
                    reason = %err,
                    "[qc-18] Dropped request"
                );
            }
        }
    }

    async fn try_process(&self, request: OracleRequest) -> OracleResult<()> {
        let request_id = request.request_id;
        let request = match self.ledger.get_request(&request_id).await? {
            Some(current) if current.is_pending() => current,
            Some(_) => return Err(already_finished(&request_id)),
            None => {
                return Err(OracleError::RequestNotFound {
                    request_id: short_hex(&request_id),
                })
            }
        };

        let fee_per_byte = self.ledger.fee_per_byte().await?;
        let response = self.protocols.process(&request, fee_per_byte).await;

        let validators = self.ledger.validator_set().await?;
        let contract = MultiSigContract::with_quorum(&validators)?;
        let height = self.ledger.current_height().await?;

        let mut tx = build_response_transaction(response, &contract, height);
        tx.system_fee = self.ledger.simulate_and_fee(&tx).await?;
        tx.network_fee = network_fee(&tx, &contract, fee_per_byte);
        let tx_hash = tx.hash();

        let signers: Vec<Arc<Secp256k1KeyPair>> = self
            .signers
            .read()
            .iter()
            .filter(|key| validators.contains(&key.public_key()))
            .cloned()
            .collect();
        if signers.is_empty() {
            return Err(OracleError::NoOracleAccounts);
        }

        debug!(
            request_id = %short_hex(&request_id),
            tx_hash = %short_hex(&tx_hash),
            signers = signers.len(),
            "[qc-18] Candidate response built"
        );

        for key in signers {
            let signature = key.sign(&tx_hash);
            let item = ResponseItem::local(key.public_key(), signature, tx.clone(), self.time.now());
            self.merge_response(request_id, item, Some(request.clone()), &validators)
                .await?;
            self.broadcaster
                .broadcast(&OraclePayload::sign(&key, request_id, signature));
        }
        Ok(())
    }

    async fn accept_payload(&self, payload: OraclePayload) -> OracleResult<MergeOutcome> {
        if !self.started.load(Ordering::Acquire) {
            return Err(OracleError::NotStarted);
        }
        payload.verify()?;

        let validators = self.ledger.validator_set().await?;
        if !validators.contains(&payload.signer) {
            return Err(OracleError::UnauthorizedSigner {
                signer: payload.signer.to_string(),
            });
        }

        // Unknown requests are accepted: a peer may persist the request first.
        if let Some(request) = self.ledger.get_request(&payload.request_id).await? {
            if !request.is_pending() {
                return Err(already_finished(&payload.request_id));
            }
        }

        let item = ResponseItem::remote(payload.signer, payload.response_signature, self.time.now());
        self.merge_response(payload.request_id, item, None, &validators)
            .await
    }

    /// Merge `item` under the task lock and relay on finalization.
    async fn merge_response(
        &self,
        request_id: Hash,
        item: ResponseItem,
        request: Option<OracleRequest>,
        validators: &[Secp256k1PublicKey],
    ) -> OracleResult<MergeOutcome> {
        let task = match self.table.get_or_create(request_id, self.time.now())? {
            TaskSlot::Existing(task) => task,
            TaskSlot::Created(task) => {
                metrics::set_pending_tasks(self.table.len());
                debug!(request_id = %short_hex(&request_id), "[qc-18] Task created");
                task
            }
            TaskSlot::Finished => return Ok(MergeOutcome::Closed),
        };

        let outcome = {
            let mut task = task.lock();
            if let Some(request) = request {
                if task.request().is_none() {
                    task.attach_request(request);
                }
            }
            task.merge(item, validators)?
        };

        if let MergeOutcome::Finalized(tx) = &outcome {
            self.table.finish(&request_id, &task, self.time.now());
            metrics::record_task_finalized();
            metrics::set_pending_tasks(self.table.len());
            info!(
                request_id = %short_hex(&request_id),
                tx_hash = %short_hex(&tx.hash()),
                "[qc-18] Response transaction finalized"
            );
            if let Err(err) = self.ledger.relay((**tx).clone()).await {
                error!(
                    request_id = %short_hex(&request_id),
                    reason = %err,
                    "[qc-18] Relay failed"
                );
            }
        }
        Ok(outcome)
    }

    fn evict_expired(&self) -> usize {
        let ttl = self.config.task_ttl.as_millis() as Millis;
        let cutoff = self.time.now().saturating_sub(ttl);
        let evicted = self.table.evict_older_than(cutoff);

        for request_id in &evicted {
            info!(
                request_id = %short_hex(request_id),
                "[qc-18] Task evicted after TTL without quorum"
            );
        }
        if !evicted.is_empty() {
            metrics::record_tasks_evicted(evicted.len());
            metrics::set_pending_tasks(self.table.len());
        }
        evicted.len()
    }
}

async fn run_worker<L, B>(
    inner: Arc<Inner<L, B>>,
    worker: usize,
    receiver: SharedReceiver,
    mut shutdown: watch::Receiver<bool>,
) where
    L: LedgerGateway,
    B: PeerBroadcaster,
{
    debug!(worker, "[qc-18] Worker started");
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            request = async { receiver.lock().await.recv().await } => request,
        };
        let Some(request) = next else { break };
        inner.process_request(request).await;
    }
    debug!(worker, "[qc-18] Worker stopped");
}

async fn run_sweeper<L, B>(inner: Arc<Inner<L, B>>, mut shutdown: watch::Receiver<bool>)
where
    L: LedgerGateway,
    B: PeerBroadcaster,
{
    let period = inner.config.sweep_interval;
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                inner.evict_expired();
            }
        }
    }
}

fn already_finished(request_id: &Hash) -> OracleError {
    OracleError::RequestAlreadyFinished {
        request_id: short_hex(request_id),
    }
}

fn outcome_label(outcome: &MergeOutcome) -> &'static str {
    match outcome {
        MergeOutcome::Closed => "closed",
        MergeOutcome::AwaitingLocal { .. } => "awaiting_local",
        MergeOutcome::Collecting { .. } => "collecting",
        MergeOutcome::Finalized(_) => "finalized",
    }
}
