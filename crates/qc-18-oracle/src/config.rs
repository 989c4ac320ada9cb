//! # Oracle Configuration
//!
//! Engine sizing, eviction policy, peer list and fetch-protocol settings.
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `QC_ORACLE_WORKERS` | `worker_count` | 4 |
//! | `QC_ORACLE_QUEUE_CAPACITY` | `queue_capacity` | 1000 |
//! | `QC_ORACLE_BACKPRESSURE` | `backpressure` (`block` / `reject`) | reject |
//! | `QC_ORACLE_MAX_PENDING` | `max_pending_tasks` | 10000 |
//! | `QC_ORACLE_TASK_TTL_SECS` | `task_ttl` | 300 |
//! | `QC_ORACLE_SWEEP_SECS` | `sweep_interval` | 30 |
//! | `QC_ORACLE_PEERS` | `peers` (comma separated) | empty |
//! | `QC_ORACLE_FETCH_TIMEOUT_MS` | `fetch.timeout` | 5000 |
//! | `QC_ORACLE_CONTENT_TYPES` | `fetch.allowed_content_types` | application/json |
//! | `QC_ORACLE_ALLOW_PRIVATE_HOSTS` | `fetch.allow_private_hosts` | false |
//! | `QC_ORACLE_MAX_RESPONSE_BYTES` | `fetch.max_response_bytes` | 65536 |

use crate::error::{OracleError, OracleResult};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Bounds enforced by [`OracleConfig::validate`].
pub mod limits {
    use std::time::Duration;

    /// Maximum worker tasks.
    pub const MAX_WORKERS: usize = 256;

    /// Maximum submission queue capacity.
    pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;

    /// Maximum pending aggregation tasks.
    pub const MAX_PENDING_TASKS: usize = 1_000_000;

    /// Maximum task lifetime.
    pub const MAX_TASK_TTL: Duration = Duration::from_secs(3600);

    /// Maximum fetch timeout.
    pub const MAX_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

    /// Maximum accepted response body.
    pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;
}

/// What `submit_request` does when the submission queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Wait until a worker frees a slot.
    Block,
    /// Fail immediately with `QueueFull`.
    #[default]
    Reject,
}

impl FromStr for BackpressurePolicy {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "reject" => Ok(Self::Reject),
            other => Err(OracleError::Config {
                reason: format!("unknown backpressure policy '{}'", other),
            }),
        }
    }
}

/// Settings for the external data fetch.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accepted `Content-Type` media types (case-insensitive).
    pub allowed_content_types: Vec<String>,
    /// Permit loopback, private and link-local targets.
    ///
    /// SECURITY: leave disabled outside tests.
    pub allow_private_hosts: bool,
    /// Largest response body accepted.
    pub max_response_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            allowed_content_types: vec!["application/json".to_string()],
            allow_private_hosts: false,
            max_response_bytes: 64 * 1024,
        }
    }
}

/// Oracle engine configuration.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Number of worker tasks draining the submission queue.
    pub worker_count: usize,
    /// Submission queue capacity.
    pub queue_capacity: usize,
    /// Behaviour when the queue is full.
    pub backpressure: BackpressurePolicy,
    /// Maximum concurrently pending aggregation tasks.
    pub max_pending_tasks: usize,
    /// Age after which an unfinished task is abandoned.
    pub task_ttl: Duration,
    /// How often the eviction sweep runs.
    pub sweep_interval: Duration,
    /// Peer addresses (`host:port` or full URL) receiving our payloads.
    pub peers: Vec<String>,
    /// Fetch protocol settings.
    pub fetch: FetchConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 1000,
            backpressure: BackpressurePolicy::Reject,
            max_pending_tasks: 10_000,
            task_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            peers: Vec::new(),
            fetch: FetchConfig::default(),
        }
    }
}

impl OracleConfig {
    /// Build configuration from `QC_ORACLE_*` environment variables.
    ///
    /// Unset variables keep their defaults; malformed values are errors.
    pub fn from_env() -> OracleResult<Self> {
        let defaults = Self::default();

        let backpressure = match env::var("QC_ORACLE_BACKPRESSURE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.backpressure,
        };

        let peers = env::var("QC_ORACLE_PEERS")
            .map(|v| split_list(&v))
            .unwrap_or(defaults.peers);

        let allowed_content_types = env::var("QC_ORACLE_CONTENT_TYPES")
            .map(|v| split_list(&v))
            .unwrap_or(defaults.fetch.allowed_content_types);

        Ok(Self {
            worker_count: env_parse("QC_ORACLE_WORKERS")?.unwrap_or(defaults.worker_count),
            queue_capacity: env_parse("QC_ORACLE_QUEUE_CAPACITY")?
                .unwrap_or(defaults.queue_capacity),
            backpressure,
            max_pending_tasks: env_parse("QC_ORACLE_MAX_PENDING")?
                .unwrap_or(defaults.max_pending_tasks),
            task_ttl: env_parse("QC_ORACLE_TASK_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.task_ttl),
            sweep_interval: env_parse("QC_ORACLE_SWEEP_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            peers,
            fetch: FetchConfig {
                timeout: env_parse("QC_ORACLE_FETCH_TIMEOUT_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.fetch.timeout),
                allowed_content_types,
                allow_private_hosts: env::var("QC_ORACLE_ALLOW_PRIVATE_HOSTS")
                    .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                    .unwrap_or(defaults.fetch.allow_private_hosts),
                max_response_bytes: env_parse("QC_ORACLE_MAX_RESPONSE_BYTES")?
                    .unwrap_or(defaults.fetch.max_response_bytes),
            },
        })
    }

    /// Check every value against [`limits`].
    pub fn validate(&self) -> OracleResult<()> {
        check_range("worker_count", self.worker_count, 1, limits::MAX_WORKERS)?;
        check_range(
            "queue_capacity",
            self.queue_capacity,
            1,
            limits::MAX_QUEUE_CAPACITY,
        )?;
        check_range(
            "max_pending_tasks",
            self.max_pending_tasks,
            1,
            limits::MAX_PENDING_TASKS,
        )?;
        check_range(
            "fetch.max_response_bytes",
            self.fetch.max_response_bytes,
            1,
            limits::MAX_RESPONSE_BYTES,
        )?;

        if self.task_ttl.is_zero() || self.task_ttl > limits::MAX_TASK_TTL {
            return Err(config_error(format!(
                "task_ttl {:?} outside (0, {:?}]",
                self.task_ttl,
                limits::MAX_TASK_TTL
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(config_error("sweep_interval must be non-zero".to_string()));
        }
        if self.fetch.timeout.is_zero() || self.fetch.timeout > limits::MAX_FETCH_TIMEOUT {
            return Err(config_error(format!(
                "fetch.timeout {:?} outside (0, {:?}]",
                self.fetch.timeout,
                limits::MAX_FETCH_TIMEOUT
            )));
        }
        if self.fetch.allowed_content_types.is_empty() {
            return Err(config_error(
                "fetch.allowed_content_types must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn config_error(reason: String) -> OracleError {
    OracleError::Config { reason }
}

fn check_range(field: &str, value: usize, min: usize, max: usize) -> OracleResult<()> {
    if value < min || value > max {
        return Err(config_error(format!(
            "{} = {} outside [{}, {}]",
            field, value, min, max
        )));
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_parse<T: FromStr>(key: &str) -> OracleResult<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| config_error(format!("{} has invalid value '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}
