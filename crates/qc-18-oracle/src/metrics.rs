//! # Oracle Metrics
//!
//! Prometheus metrics for the aggregation engine.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-18-oracle = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `oracle_requests_processed_total` - Requests that produced a signed candidate
//! - `oracle_requests_dropped_total` - Requests dropped (by reason)
//! - `oracle_payloads_accepted_total` - Peer payloads merged
//! - `oracle_payloads_rejected_total` - Peer payloads rejected (by reason)
//! - `oracle_tasks_finalized_total` - Response transactions relayed
//! - `oracle_tasks_evicted_total` - Tasks abandoned by the TTL sweep
//! - `oracle_pending_tasks` - Gauge of in-flight aggregation tasks
//! - `oracle_queue_rejections_total` - Submissions refused by a full queue

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Requests that produced a signed candidate
    pub static ref REQUESTS_PROCESSED: IntCounter = register_int_counter!(
        "oracle_requests_processed_total",
        "Total number of oracle requests processed"
    )
    .expect("Failed to create REQUESTS_PROCESSED metric");

    /// Requests dropped, labeled by reason
    pub static ref REQUESTS_DROPPED: IntCounterVec = register_int_counter_vec!(
        "oracle_requests_dropped_total",
        "Total number of oracle requests dropped",
        &["reason"]
    )
    .expect("Failed to create REQUESTS_DROPPED metric");

    /// Peer payloads merged
    pub static ref PAYLOADS_ACCEPTED: IntCounter = register_int_counter!(
        "oracle_payloads_accepted_total",
        "Total number of peer payloads accepted"
    )
    .expect("Failed to create PAYLOADS_ACCEPTED metric");

    /// Peer payloads rejected, labeled by reason
    pub static ref PAYLOADS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "oracle_payloads_rejected_total",
        "Total number of peer payloads rejected",
        &["reason"]
    )
    .expect("Failed to create PAYLOADS_REJECTED metric");

    /// Response transactions relayed
    pub static ref TASKS_FINALIZED: IntCounter = register_int_counter!(
        "oracle_tasks_finalized_total",
        "Total number of aggregation tasks finalized"
    )
    .expect("Failed to create TASKS_FINALIZED metric");

    /// Tasks abandoned by the TTL sweep
    pub static ref TASKS_EVICTED: IntCounter = register_int_counter!(
        "oracle_tasks_evicted_total",
        "Total number of aggregation tasks evicted"
    )
    .expect("Failed to create TASKS_EVICTED metric");

    /// In-flight aggregation tasks
    pub static ref PENDING_TASKS: IntGauge = register_int_gauge!(
        "oracle_pending_tasks",
        "Number of in-flight aggregation tasks"
    )
    .expect("Failed to create PENDING_TASKS metric");

    /// Submissions refused by a full queue
    pub static ref QUEUE_REJECTIONS: IntCounter = register_int_counter!(
        "oracle_queue_rejections_total",
        "Total number of submissions rejected by a full queue"
    )
    .expect("Failed to create QUEUE_REJECTIONS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a processed request
#[cfg(feature = "metrics")]
pub fn record_request_processed() {
    REQUESTS_PROCESSED.inc();
}

/// Record a dropped request with reason
#[cfg(feature = "metrics")]
pub fn record_request_dropped(reason: &str) {
    REQUESTS_DROPPED.with_label_values(&[reason]).inc();
}

/// Record an accepted peer payload
#[cfg(feature = "metrics")]
pub fn record_payload_accepted() {
    PAYLOADS_ACCEPTED.inc();
}

/// Record a rejected peer payload with reason
#[cfg(feature = "metrics")]
pub fn record_payload_rejected(reason: &str) {
    PAYLOADS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a finalized task
#[cfg(feature = "metrics")]
pub fn record_task_finalized() {
    TASKS_FINALIZED.inc();
}

/// Record evicted tasks
#[cfg(feature = "metrics")]
pub fn record_tasks_evicted(count: usize) {
    TASKS_EVICTED.inc_by(count as u64);
}

/// Update pending tasks gauge
#[cfg(feature = "metrics")]
pub fn set_pending_tasks(count: usize) {
    PENDING_TASKS.set(count as i64);
}

/// Record a queue rejection
#[cfg(feature = "metrics")]
pub fn record_queue_rejection() {
    QUEUE_REJECTIONS.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_request_processed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_request_dropped(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_payload_accepted() {}

#[cfg(not(feature = "metrics"))]
pub fn record_payload_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_task_finalized() {}

#[cfg(not(feature = "metrics"))]
pub fn record_tasks_evicted(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn set_pending_tasks(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_queue_rejection() {}
