//! # M-of-N Multi-Signature Contracts
//!
//! A contract is a sorted, de-duplicated set of N secp256k1 keys and a
//! threshold M. Its witness is M signatures concatenated in key order.
//!
//! ## Verification Script Layout
//!
//! ```text
//! threshold (u16 LE) || key_1 .. key_N (33 bytes each) || N (u16 LE)
//! ```
//!
//! ## Quorum
//!
//! Oracle contracts use `M = N - floor((N - 1) / 3)`, tolerating up to
//! `floor((N - 1) / 3)` absent or byzantine signers.

use crate::ecdsa::{Secp256k1PublicKey, Secp256k1Signature, SIGNATURE_LENGTH};
use crate::hashing::script_hash;
use crate::CryptoError;

/// Upper bound on keys in a single contract.
pub const MAX_MULTISIG_KEYS: usize = 1024;

/// Minimum signers required out of `n`.
///
/// Returns 0 for an empty set.
pub fn quorum_size(n: usize) -> usize {
    n - n.saturating_sub(1) / 3
}

/// M-of-N signature contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSigContract {
    threshold: usize,
    public_keys: Vec<Secp256k1PublicKey>,
}

impl MultiSigContract {
    /// Create a contract requiring `threshold` of `public_keys`.
    ///
    /// Keys are sorted and duplicates removed before the bounds are checked.
    pub fn new(
        threshold: usize,
        public_keys: &[Secp256k1PublicKey],
    ) -> Result<Self, CryptoError> {
        let mut keys = public_keys.to_vec();
        keys.sort();
        keys.dedup();

        if threshold == 0 || threshold > keys.len() || keys.len() > MAX_MULTISIG_KEYS {
            return Err(CryptoError::InvalidMultiSig {
                threshold,
                keys: keys.len(),
            });
        }

        Ok(Self {
            threshold,
            public_keys: keys,
        })
    }

    /// Create a contract over `public_keys` with the oracle quorum threshold.
    pub fn with_quorum(public_keys: &[Secp256k1PublicKey]) -> Result<Self, CryptoError> {
        let mut keys = public_keys.to_vec();
        keys.sort();
        keys.dedup();
        Self::new(quorum_size(keys.len()), &keys)
    }

    /// Signatures required.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Sorted member keys.
    pub fn public_keys(&self) -> &[Secp256k1PublicKey] {
        &self.public_keys
    }

    /// Position of `key` in the sorted member list.
    pub fn index_of(&self, key: &Secp256k1PublicKey) -> Option<usize> {
        self.public_keys.binary_search(key).ok()
    }

    /// Whether `key` is a member.
    pub fn contains(&self, key: &Secp256k1PublicKey) -> bool {
        self.index_of(key).is_some()
    }

    /// Encoded verification script.
    pub fn verification_script(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(4 + self.public_keys.len() * 33);
        script.extend_from_slice(&(self.threshold as u16).to_le_bytes());
        for key in &self.public_keys {
            script.extend_from_slice(key.as_bytes());
        }
        script.extend_from_slice(&(self.public_keys.len() as u16).to_le_bytes());
        script
    }

    /// Contract address.
    pub fn script_hash(&self) -> [u8; 20] {
        script_hash(&self.verification_script())
    }

    /// Size of a complete invocation (threshold signatures).
    pub fn invocation_len(&self) -> usize {
        self.threshold * SIGNATURE_LENGTH
    }

    /// Verify a complete invocation over `message`.
    ///
    /// Signatures must be ordered consistently with the sorted keys; each key
    /// may satisfy at most one signature.
    pub fn verify(&self, message: &[u8], invocation: &[u8]) -> bool {
        if invocation.len() != self.invocation_len() {
            return false;
        }

        let signatures: Vec<Secp256k1Signature> = invocation
            .chunks_exact(SIGNATURE_LENGTH)
            .filter_map(|chunk| Secp256k1Signature::from_slice(chunk).ok())
            .collect();

        let (mut i, mut j) = (0usize, 0usize);
        let (m, n) = (signatures.len(), self.public_keys.len());
        while i < m && j < n {
            if self.public_keys[j].verify(message, &signatures[i]).is_ok() {
                i += 1;
            }
            j += 1;
            if m - i > n - j {
                return false;
            }
        }
        i == m
    }
}
