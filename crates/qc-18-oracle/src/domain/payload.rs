//! # Oracle Payload
//!
//! Wire form of a partial response exchanged between oracle nodes.
//!
//! ## Layout
//!
//! ```text
//! signer (33) ‖ request_id (32) ‖ response_signature (64) ‖ varint(1) ‖ witness
//! witness = varbytes(invocation: 64-byte signature over payload hash)
//!         ‖ varbytes(verification: signer's 33-byte key)
//! ```
//!
//! The payload hash is BLAKE3 over the first three fields. Anything other
//! than exactly one witness, or bytes after it, is a format error.

use crate::error::{OracleError, OracleResult};
use shared_crypto::ecdsa::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use shared_crypto::{blake3_hash, Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
use shared_types::encoding::{write_var_int, Reader};
use shared_types::{short_hex, Hash, Witness};

/// Upper bound on a witness field; a self-signature witness is far smaller.
const MAX_WITNESS_FIELD: usize = 1024;

/// Signed partial response for gossip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OraclePayload {
    /// Oracle that produced the signature.
    pub signer: Secp256k1PublicKey,
    /// Request being answered.
    pub request_id: Hash,
    /// Signature over the signer's candidate response transaction hash.
    pub response_signature: Secp256k1Signature,
    /// Self-signature of `signer` over [`Self::hash`].
    pub witness: Witness,
}

impl OraclePayload {
    /// Build and self-sign a payload.
    pub fn sign(
        key: &Secp256k1KeyPair,
        request_id: Hash,
        response_signature: Secp256k1Signature,
    ) -> Self {
        let signer = key.public_key();
        let hash = unsigned_hash(&signer, &request_id, &response_signature);
        let witness = Witness::new(
            key.sign(&hash).as_bytes().to_vec(),
            signer.as_bytes().to_vec(),
        );
        Self {
            signer,
            request_id,
            response_signature,
            witness,
        }
    }

    /// Content hash of the unsigned fields.
    pub fn hash(&self) -> Hash {
        unsigned_hash(&self.signer, &self.request_id, &self.response_signature)
    }

    /// Check the self-signature witness against `signer`.
    pub fn verify(&self) -> OracleResult<()> {
        let invalid = || OracleError::InvalidSignature {
            signer: self.signer.to_string(),
        };

        if self.witness.verification.as_slice() != self.signer.as_bytes() {
            return Err(invalid());
        }
        let signature =
            Secp256k1Signature::from_slice(&self.witness.invocation).map_err(|_| invalid())?;
        self.signer
            .verify(&self.hash(), &signature)
            .map_err(|_| invalid())
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            PUBLIC_KEY_LENGTH + 32 + SIGNATURE_LENGTH + 1 + self.witness.size(),
        );
        buf.extend_from_slice(self.signer.as_bytes());
        buf.extend_from_slice(&self.request_id);
        buf.extend_from_slice(self.response_signature.as_bytes());
        write_var_int(&mut buf, 1);
        self.witness.encode(&mut buf);
        buf
    }

    /// Parse wire bytes.
    pub fn decode(bytes: &[u8]) -> OracleResult<Self> {
        let mut reader = Reader::new(bytes);

        let signer = Secp256k1PublicKey::from_bytes(reader.read_array::<PUBLIC_KEY_LENGTH>()?)
            .map_err(|e| OracleError::Format {
                reason: format!("signer: {}", e),
            })?;
        let request_id = reader.read_array::<32>()?;
        let response_signature =
            Secp256k1Signature::from_bytes(reader.read_array::<SIGNATURE_LENGTH>()?);

        let witness_count = reader.read_var_int(u64::MAX)?;
        if witness_count != 1 {
            return Err(OracleError::Format {
                reason: format!("expected exactly 1 witness, found {}", witness_count),
            });
        }
        let invocation = reader.read_var_bytes(MAX_WITNESS_FIELD)?.to_vec();
        let verification = reader.read_var_bytes(MAX_WITNESS_FIELD)?.to_vec();
        reader.finish()?;

        Ok(Self {
            signer,
            request_id,
            response_signature,
            witness: Witness::new(invocation, verification),
        })
    }

    /// Hex form used by the RPC and peer-broadcast bodies.
    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    /// Parse the hex form.
    pub fn from_hex(data: &str) -> OracleResult<Self> {
        let bytes = hex::decode(data.trim()).map_err(|e| OracleError::Format {
            reason: format!("hex: {}", e),
        })?;
        Self::decode(&bytes)
    }

    /// Log-friendly request id.
    pub fn short_request_id(&self) -> String {
        short_hex(&self.request_id)
    }
}

fn unsigned_hash(
    signer: &Secp256k1PublicKey,
    request_id: &Hash,
    response_signature: &Secp256k1Signature,
) -> Hash {
    let mut buf = Vec::with_capacity(PUBLIC_KEY_LENGTH + 32 + SIGNATURE_LENGTH);
    buf.extend_from_slice(signer.as_bytes());
    buf.extend_from_slice(request_id);
    buf.extend_from_slice(response_signature.as_bytes());
    blake3_hash(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::keypair;
    use shared_types::encoding::write_var_bytes;

    fn sample() -> OraclePayload {
        let key = keypair(1);
        let response_signature = key.sign(b"candidate tx hash");
        OraclePayload::sign(&key, [4u8; 32], response_signature)
    }

    #[test]
    fn test_decode_restores_signed_payload() {
        let payload = sample();
        let decoded = OraclePayload::from_hex(&payload.to_hex()).unwrap();

        assert_eq!(decoded, payload);
        assert!(decoded.verify().is_ok());
    }

    #[test]
    fn test_tampered_request_id_fails_verification() {
        let mut payload = sample();
        payload.request_id[0] ^= 0xFF;
        assert!(matches!(
            payload.verify(),
            Err(OracleError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_verification_must_name_signer() {
        let mut payload = sample();
        payload.witness.verification = keypair(2).public_key().as_bytes().to_vec();
        assert!(payload.verify().is_err());
    }

    #[test]
    fn test_witness_count_other_than_one_rejected() {
        let payload = sample();
        let mut bytes = payload.encode();
        let prefix = PUBLIC_KEY_LENGTH + 32 + SIGNATURE_LENGTH;

        // Two witnesses.
        bytes[prefix] = 2;
        payload.witness.encode(&mut bytes);
        assert!(matches!(
            OraclePayload::decode(&bytes),
            Err(OracleError::Format { .. })
        ));

        // Zero witnesses.
        let mut empty = bytes[..prefix].to_vec();
        empty.push(0);
        assert!(matches!(
            OraclePayload::decode(&empty),
            Err(OracleError::Format { .. })
        ));
    }

    #[test]
    fn test_trailing_and_truncated_bytes_rejected() {
        let mut bytes = sample().encode();
        bytes.push(0);
        assert!(OraclePayload::decode(&bytes).is_err());

        let bytes = sample().encode();
        assert!(OraclePayload::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_oversized_witness_field_rejected() {
        let payload = sample();
        let mut bytes = payload.encode()[..PUBLIC_KEY_LENGTH + 32 + SIGNATURE_LENGTH].to_vec();
        bytes.push(1);
        write_var_bytes(&mut bytes, &vec![0u8; MAX_WITNESS_FIELD + 1]);
        write_var_bytes(&mut bytes, payload.signer.as_bytes());
        assert!(OraclePayload::decode(&bytes).is_err());
    }

    #[test]
    fn test_bad_hex_is_format_error() {
        assert!(matches!(
            OraclePayload::from_hex("zz"),
            Err(OracleError::Format { .. })
        ));
    }
}
