//! # BLAKE3 Hashing
//!
//! Content hashes for gossip payloads and contract addresses.

use blake3::Hasher;

/// BLAKE3 hash output (256-bit).
pub type Hash = [u8; 32];

/// Stateful BLAKE3 hasher.
pub struct Blake3Hasher {
    inner: Hasher,
}

impl Blake3Hasher {
    /// Create new hasher.
    pub fn new() -> Self {
        Self {
            inner: Hasher::new(),
        }
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return hash.
    pub fn finalize(&self) -> Hash {
        *self.inner.finalize().as_bytes()
    }
}

impl Default for Blake3Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash data with BLAKE3 (one-shot).
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple inputs as one stream.
pub fn blake3_hash_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Blake3Hasher::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize()
}

/// 20-byte address of a verification script.
pub fn script_hash(script: &[u8]) -> [u8; 20] {
    let mut address = [0u8; 20];
    address.copy_from_slice(&blake3_hash(script)[..20]);
    address
}
