//! Error types for the Oracle subsystem

use shared_crypto::CryptoError;
use shared_types::DecodeError;
use thiserror::Error;

/// Oracle subsystem errors
#[derive(Debug, Error)]
pub enum OracleError {
    /// `start` called while the service is running
    #[error("Oracle service already started")]
    AlreadyStarted,

    /// Operation requires a running service
    #[error("Oracle service not started")]
    NotStarted,

    /// None of the supplied keys belongs to the current oracle set
    #[error("No oracle accounts in the current validator set")]
    NoOracleAccounts,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Payload self-signature does not verify
    #[error("Invalid payload signature from {signer}")]
    InvalidSignature { signer: String },

    /// Payload signer is not in the authorized oracle set
    #[error("Signer {signer} is not an authorized oracle")]
    UnauthorizedSigner { signer: String },

    /// The ledger does not know this request
    #[error("Request {request_id} not found on the ledger")]
    RequestNotFound { request_id: String },

    /// The ledger already recorded a response for this request
    #[error("Request {request_id} has been finished")]
    RequestAlreadyFinished { request_id: String },

    /// Wire payload could not be decoded
    #[error("Malformed payload: {reason}")]
    Format { reason: String },

    /// Pending task table cannot accept another request
    #[error("Pending task table full (capacity {capacity})")]
    TaskTableFull { capacity: usize },

    /// Submission queue at capacity under the reject policy
    #[error("Submission queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Dry-run of the candidate transaction failed
    #[error("Transaction simulation failed: {reason}")]
    SimulationFailed { reason: String },

    /// Ledger collaborator failure
    #[error("Ledger error: {reason}")]
    Ledger { reason: String },

    /// Cryptographic failure (invalid contract, key or signature)
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl OracleError {
    /// Short label for log fields and metrics.
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::AlreadyStarted => "already_started",
            Self::NotStarted => "not_started",
            Self::NoOracleAccounts => "no_oracle_accounts",
            Self::Config { .. } => "config",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::UnauthorizedSigner { .. } => "unauthorized_signer",
            Self::RequestNotFound { .. } => "request_not_found",
            Self::RequestAlreadyFinished { .. } => "request_finished",
            Self::Format { .. } => "format",
            Self::TaskTableFull { .. } => "table_full",
            Self::QueueFull { .. } => "queue_full",
            Self::SimulationFailed { .. } => "simulation_failed",
            Self::Ledger { .. } => "ledger",
            Self::Crypto(_) => "crypto",
        }
    }
}

impl From<DecodeError> for OracleError {
    fn from(err: DecodeError) -> Self {
        Self::Format {
            reason: err.to_string(),
        }
    }
}

/// Result type for oracle operations
pub type OracleResult<T> = Result<T, OracleError>;

/// Failures while fetching and filtering external data.
///
/// None of these abort request processing: the caller turns every variant
/// into an error response so the network can still agree on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Request did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Response content type is not on the allow-list
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Target resolves to a forbidden (internal) address
    #[error("Policy violation: {0}")]
    PolicyError(String),

    /// Filter expression is invalid or does not apply to the body
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Remote answered with a non-success status
    #[error("Response error: HTTP {status}")]
    ResponseError { status: u16 },

    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// No protocol registered for the URL scheme
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// Request URL cannot be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Body exceeds the configured maximum
    #[error("Response too large: {size} bytes (max {max})")]
    ResponseTooLarge { size: usize, max: usize },
}
