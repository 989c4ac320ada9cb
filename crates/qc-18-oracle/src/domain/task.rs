//! # Aggregation Task
//!
//! Full state of one pending oracle request and the quorum-assembly step
//! run on every merge.
//!
//! ## Merge Algorithm
//!
//! ```text
//! prune(authorized) → add(item) → local item? ──no──→ AwaitingLocal
//!                                      │
//!                                     yes
//!                                      ↓
//!            context(local tx, M-of-N contract) ← every item's signature
//!                                      │
//!                    complete? ──no──→ Collecting
//!                                      │
//!                                     yes → attach witness → Finalized
//! ```
//!
//! The caller holds the task's own lock for the whole merge. Once the task
//! leaves `Pending` every further merge is a no-op.

use super::context::SignatureContext;
use super::response::{Millis, ResponseCollection, ResponseItem};
use crate::error::OracleResult;
use shared_crypto::{MultiSigContract, Secp256k1PublicKey};
use shared_types::{Hash, OracleRequest, Transaction};

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Accepting responses.
    Pending,
    /// Witness assembled and transaction handed off.
    Finalized,
    /// Abandoned by the TTL sweep.
    Evicted,
}

/// Result of merging one response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Task already finalized or evicted; nothing changed.
    Closed,
    /// No local candidate transaction yet.
    AwaitingLocal {
        /// Signers with a stored item.
        responses: usize,
    },
    /// Local candidate present, threshold not met.
    Collecting {
        /// Valid signatures over the local candidate.
        collected: usize,
        /// Signatures required.
        required: usize,
    },
    /// Threshold met; the witnessed transaction is ready to relay.
    Finalized(Box<Transaction>),
}

/// One pending request.
#[derive(Debug)]
pub struct AggregationTask {
    request_id: Hash,
    request: Option<OracleRequest>,
    responses: ResponseCollection,
    context: Option<SignatureContext>,
    created_at: Millis,
    state: TaskState,
}

impl AggregationTask {
    /// Create an empty task.
    pub fn new(request_id: Hash, created_at: Millis) -> Self {
        Self {
            request_id,
            request: None,
            responses: ResponseCollection::new(),
            context: None,
            created_at,
            state: TaskState::Pending,
        }
    }

    /// Request this task aggregates.
    pub fn request_id(&self) -> &Hash {
        &self.request_id
    }

    /// Descriptor, once this node has processed the request.
    pub fn request(&self) -> Option<&OracleRequest> {
        self.request.as_ref()
    }

    /// Record the descriptor read from the ledger.
    pub fn attach_request(&mut self, request: OracleRequest) {
        self.request = Some(request);
    }

    /// Creation time.
    pub fn created_at(&self) -> Millis {
        self.created_at
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Collected responses.
    pub fn responses(&self) -> &ResponseCollection {
        &self.responses
    }

    /// Mark the task abandoned. No-op unless pending.
    pub fn evict(&mut self) {
        if self.state == TaskState::Pending {
            self.state = TaskState::Evicted;
        }
    }

    /// Merge a response item and try to assemble the witness.
    ///
    /// `authorized` is the current oracle set; the threshold is its quorum.
    pub fn merge(
        &mut self,
        item: ResponseItem,
        authorized: &[Secp256k1PublicKey],
    ) -> OracleResult<MergeOutcome> {
        if self.state != TaskState::Pending {
            return Ok(MergeOutcome::Closed);
        }

        self.responses.prune_to(authorized);
        self.responses.add(item);

        let Some(local_tx) = self
            .responses
            .local_item()
            .and_then(|local| local.transaction.clone())
        else {
            return Ok(MergeOutcome::AwaitingLocal {
                responses: self.responses.len(),
            });
        };

        let contract = MultiSigContract::with_quorum(authorized)?;
        let tx_hash = local_tx.hash();

        let context = match self.context.take() {
            Some(existing) if existing.matches(&tx_hash, &contract) => existing,
            _ => SignatureContext::new(tx_hash, contract),
        };
        let context = self.context.insert(context);

        // Only signers with a current item may count toward the threshold.
        let responses = &self.responses;
        context.retain_signers(|signer| responses.get(signer).is_some());
        for response in self.responses.iter() {
            context.add_signature(&response.signer, &response.signature);
        }

        match context.witness() {
            Some(witness) => {
                let mut tx = local_tx;
                tx.witnesses = vec![witness];
                self.state = TaskState::Finalized;
                Ok(MergeOutcome::Finalized(Box::new(tx)))
            }
            None => Ok(MergeOutcome::Collecting {
                collected: context.collected(),
                required: context.required(),
            }),
        }
    }
}
