//! # Core Ledger Entities
//!
//! Types the ledger owns and the oracle subsystem reads or produces.
//!
//! ## Clusters
//!
//! - **Primitives**: `Hash`, `Address`
//! - **Oracle Requests**: `OracleRequest`, `RequestStatus`, `OracleResponseAttribute`
//! - **Transactions**: `Transaction`, `TransactionAttribute`, `Witness`, `WitnessScope`

use crate::encoding::{var_bytes_size, var_int_size, write_var_bytes, write_var_int};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};

// =============================================================================
// CLUSTER A: PRIMITIVES
// =============================================================================

/// A 32-byte content hash.
pub type Hash = [u8; 32];

/// A 20-byte account / contract address.
pub type Address = [u8; 20];

/// Address of the native oracle contract.
///
/// Response transactions are sent from, and may only be witnessed for,
/// this contract.
pub const ORACLE_CONTRACT_ADDRESS: Address = [
    0x8d, 0xc0, 0xe7, 0x42, 0xcb, 0xdf, 0xdc, 0xda, 0x51, 0x89, 0x3c, 0x1f, 0x31, 0x56, 0x5f,
    0x3f, 0x85, 0x1c, 0xd4, 0x2e,
];

/// Upper bound on how far ahead `valid_until_block` may be set.
pub const MAX_VALID_UNTIL_BLOCK_INCREMENT: u32 = 2_102_400;

/// Short hex rendering of a hash for log lines.
pub fn short_hex(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(8)])
}

// =============================================================================
// CLUSTER B: ORACLE REQUESTS
// =============================================================================

/// Lifecycle of an oracle request on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting a response transaction.
    Requested,
    /// A response has been accepted; no further responses are wanted.
    Ready,
}

/// An oracle request descriptor as recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Hash of the transaction that created the request.
    pub request_id: Hash,
    /// Resource locator to fetch.
    pub url: String,
    /// Optional JSONPath filter applied to the fetched payload.
    pub filter: Option<String>,
    /// Current status.
    pub status: RequestStatus,
}

impl OracleRequest {
    /// Create a new request in the `Requested` state.
    pub fn new(request_id: Hash, url: impl Into<String>, filter: Option<String>) -> Self {
        Self {
            request_id,
            url: url.into(),
            filter,
            status: RequestStatus::Requested,
        }
    }

    /// Whether the request still accepts responses.
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Requested
    }
}

/// Result of serving an oracle request, embedded in the response transaction.
///
/// An error response carries no data and no filter cost so that the network
/// can still reach agreement on a negative outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResponseAttribute {
    /// Request being answered.
    pub request_id: Hash,
    /// Filtered response body, `None` on error.
    pub data: Option<Vec<u8>>,
    /// Fee charged for the bytes removed by filtering.
    pub filter_cost: u64,
}

impl OracleResponseAttribute {
    /// Successful response.
    pub fn success(request_id: Hash, data: Vec<u8>, filter_cost: u64) -> Self {
        Self {
            request_id,
            data: Some(data),
            filter_cost,
        }
    }

    /// Error response (no data).
    pub fn error(request_id: Hash) -> Self {
        Self {
            request_id,
            data: None,
            filter_cost: 0,
        }
    }

    /// Whether this is an error response.
    pub fn is_error(&self) -> bool {
        self.data.is_none()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.request_id);
        buf.extend_from_slice(&self.filter_cost.to_le_bytes());
        match &self.data {
            Some(data) => {
                buf.push(1);
                write_var_bytes(buf, data);
            }
            None => buf.push(0),
        }
    }
}

// =============================================================================
// CLUSTER C: TRANSACTIONS
// =============================================================================

/// Scope in which a cosigner's witness is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WitnessScope {
    /// Valid everywhere.
    Global = 0x00,
    /// Valid only for the entry script.
    CalledByEntry = 0x01,
    /// Valid only for the listed contracts.
    CustomContracts = 0x10,
}

/// Transaction attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionAttribute {
    /// Additional account whose witness authorizes the transaction.
    Cosigner {
        account: Address,
        allowed_contracts: Vec<Address>,
        scope: WitnessScope,
    },
    /// Oracle response payload.
    OracleResponse(OracleResponseAttribute),
}

impl TransactionAttribute {
    const COSIGNER_TAG: u8 = 0x20;
    const ORACLE_RESPONSE_TAG: u8 = 0x11;

    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Cosigner {
                account,
                allowed_contracts,
                scope,
            } => {
                buf.push(Self::COSIGNER_TAG);
                buf.extend_from_slice(account);
                buf.push(*scope as u8);
                write_var_int(buf, allowed_contracts.len() as u64);
                for contract in allowed_contracts {
                    buf.extend_from_slice(contract);
                }
            }
            Self::OracleResponse(response) => {
                buf.push(Self::ORACLE_RESPONSE_TAG);
                response.encode(buf);
            }
        }
    }
}

/// Proof authorizing a transaction or payload.
///
/// `invocation` carries signatures, `verification` describes who must have
/// signed (a single public key or a multi-signature contract script).
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    #[serde_as(as = "Bytes")]
    pub invocation: Vec<u8>,
    #[serde_as(as = "Bytes")]
    pub verification: Vec<u8>,
}

impl Witness {
    /// Create a witness.
    pub fn new(invocation: Vec<u8>, verification: Vec<u8>) -> Self {
        Self {
            invocation,
            verification,
        }
    }

    /// Append the encoded witness.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        write_var_bytes(buf, &self.invocation);
        write_var_bytes(buf, &self.verification);
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        var_bytes_size(self.invocation.len()) + var_bytes_size(self.verification.len())
    }
}

/// A ledger transaction.
///
/// The hash covers every field except `witnesses`, so witnesses can be
/// attached after signatures were collected over the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub nonce: u32,
    pub sender: Address,
    pub system_fee: u64,
    pub network_fee: u64,
    pub valid_until_block: u32,
    pub attributes: Vec<TransactionAttribute>,
    pub script: Vec<u8>,
    pub witnesses: Vec<Witness>,
}

impl Transaction {
    /// Bytes covered by the transaction hash and by signatures.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.script.len());
        buf.push(self.version);
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.sender);
        buf.extend_from_slice(&self.system_fee.to_le_bytes());
        buf.extend_from_slice(&self.network_fee.to_le_bytes());
        buf.extend_from_slice(&self.valid_until_block.to_le_bytes());
        write_var_int(&mut buf, self.attributes.len() as u64);
        for attribute in &self.attributes {
            attribute.encode(&mut buf);
        }
        write_var_bytes(&mut buf, &self.script);
        buf
    }

    /// Transaction hash (SHA-256 of the signing bytes).
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_bytes());
        hasher.finalize().into()
    }

    /// Full encoded size including witnesses.
    pub fn size(&self) -> usize {
        self.signing_bytes().len()
            + var_int_size(self.witnesses.len() as u64)
            + self.witnesses.iter().map(Witness::size).sum::<usize>()
    }

    /// The oracle response carried by this transaction, if any.
    pub fn oracle_response(&self) -> Option<&OracleResponseAttribute> {
        self.attributes.iter().find_map(|attribute| match attribute {
            TransactionAttribute::OracleResponse(response) => Some(response),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 0,
            nonce: 0,
            sender: ORACLE_CONTRACT_ADDRESS,
            system_fee: 100,
            network_fee: 10,
            valid_until_block: 42,
            attributes: vec![TransactionAttribute::OracleResponse(
                OracleResponseAttribute::success([1u8; 32], b"[1]".to_vec(), 3),
            )],
            script: vec![0xAA, 0xBB],
            witnesses: vec![],
        }
    }

    #[test]
    fn test_hash_ignores_witnesses() {
        let tx = sample_tx();
        let mut witnessed = tx.clone();
        witnessed.witnesses.push(Witness::new(vec![1; 64], vec![2; 33]));

        assert_eq!(tx.hash(), witnessed.hash());
        assert!(witnessed.size() > tx.size());
    }

    #[test]
    fn test_hash_covers_response_data() {
        let tx = sample_tx();
        let mut other = tx.clone();
        other.attributes = vec![TransactionAttribute::OracleResponse(
            OracleResponseAttribute::error([1u8; 32]),
        )];

        assert_ne!(tx.hash(), other.hash());
    }

    #[test]
    fn test_oracle_response_lookup() {
        let tx = sample_tx();
        let response = tx.oracle_response().unwrap();
        assert_eq!(response.request_id, [1u8; 32]);
        assert!(!response.is_error());
    }

    #[test]
    fn test_request_pending_state() {
        let mut request = OracleRequest::new([9u8; 32], "https://example.com", None);
        assert!(request.is_pending());

        request.status = RequestStatus::Ready;
        assert!(!request.is_pending());
    }

    #[test]
    fn test_witness_serde_roundtrip() {
        let witness = Witness::new(vec![1, 2, 3], vec![4, 5]);
        let json = serde_json::to_string(&witness).unwrap();
        let restored: Witness = serde_json::from_str(&json).unwrap();
        assert_eq!(witness, restored);
    }
}
