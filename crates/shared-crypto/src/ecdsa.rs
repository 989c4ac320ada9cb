//! # ECDSA Signatures (secp256k1)
//!
//! Oracle signer identities are compressed secp256k1 public keys; partial
//! responses carry 64-byte `r || s` signatures.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization
//! - Secret key material is zeroized on drop

use crate::CryptoError;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use std::fmt;
use zeroize::Zeroize;

/// Length of a compressed public key.
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Length of an `r || s` signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Compressed secp256k1 public key (33 bytes).
///
/// Ordered by its encoded bytes; multi-signature contracts sort keys with
/// this ordering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Secp256k1PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl Secp256k1PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Create from a slice that must be exactly 33 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; PUBLIC_KEY_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                expected: PUBLIC_KEY_LENGTH,
                actual: bytes.len(),
            })?;
        Self::from_bytes(array)
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// Verify a signature over `message`.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &Secp256k1Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignature)?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl fmt::Debug for Secp256k1PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secp256k1PublicKey({})", self)
    }
}

impl fmt::Display for Secp256k1PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// ECDSA signature (64 bytes, r||s format).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; SIGNATURE_LENGTH]);

impl Secp256k1Signature {
    /// Create from bytes (64 bytes).
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create from a slice that must be exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                expected: SIGNATURE_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Secp256k1Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secp256k1Signature({}..)", hex::encode(&self.0[..8]))
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let encoded = self.signing_key.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        bytes.copy_from_slice(encoded.as_bytes());
        Secp256k1PublicKey(bytes)
    }

    /// Sign a message (deterministic RFC 6979).
    pub fn sign(&self, message: &[u8]) -> Secp256k1Signature {
        let sig: Signature = self.signing_key.sign(message);
        let bytes: [u8; SIGNATURE_LENGTH] = sig.to_bytes().into();
        Secp256k1Signature(bytes)
    }
}

impl fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secp256k1KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = Secp256k1KeyPair::generate();
        let message = b"oracle response";

        let signature = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = Secp256k1KeyPair::generate();

        let signature = keypair.sign(b"message1");
        let result = keypair.public_key().verify(b"message2", &signature);

        assert_eq!(result, Err(CryptoError::SignatureVerificationFailed));
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();
        let message = b"deterministic test";

        assert_eq!(keypair.sign(message), keypair.sign(message));
    }

    #[test]
    fn test_public_key_is_compressed() {
        let keypair = Secp256k1KeyPair::from_bytes([0x11u8; 32]).unwrap();
        let public_key = keypair.public_key();

        assert!(matches!(public_key.as_bytes()[0], 0x02 | 0x03));
        assert_eq!(
            Secp256k1PublicKey::from_slice(public_key.as_bytes()).unwrap(),
            public_key
        );
    }

    #[test]
    fn test_from_slice_rejects_bad_lengths() {
        assert!(matches!(
            Secp256k1PublicKey::from_slice(&[2u8; 32]),
            Err(CryptoError::InvalidLength {
                expected: 33,
                actual: 32
            })
        ));
        assert!(matches!(
            Secp256k1Signature::from_slice(&[0u8; 65]),
            Err(CryptoError::InvalidLength {
                expected: 64,
                actual: 65
            })
        ));
    }

    #[test]
    fn test_invalid_point_rejected() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x05;
        assert_eq!(
            Secp256k1PublicKey::from_bytes(bytes),
            Err(CryptoError::InvalidPublicKey)
        );
    }
}
