//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Invalid length for a fixed-size value
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Multi-signature contract parameters out of range
    #[error("Invalid multi-signature contract: threshold {threshold} of {keys} keys")]
    InvalidMultiSig {
        /// Requested threshold
        threshold: usize,
        /// Number of distinct keys
        keys: usize,
    },
}
