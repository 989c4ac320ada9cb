//! # Shared Crypto
//!
//! Cryptographic primitives used by the oracle subsystem.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 | Oracle signer identity and partial signatures |
//! | `hashing` | BLAKE3 | Payload content hashes, contract addresses |
//! | `multisig` | M-of-N secp256k1 | Threshold witness for response transactions |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S signatures
//! - **Multi-signature**: signatures must appear in public-key order, each key
//!   is used at most once

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod multisig;

// Re-exports
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use errors::CryptoError;
pub use hashing::{blake3_hash, blake3_hash_many, script_hash, Blake3Hasher};
pub use multisig::{quorum_size, MultiSigContract};
