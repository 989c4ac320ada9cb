//! # Signature Assembly Context
//!
//! Collects verified signatures over one candidate transaction for one
//! multi-signature contract, and yields the combined witness once the
//! contract threshold is reached.

use shared_crypto::{MultiSigContract, Secp256k1PublicKey, Secp256k1Signature};
use shared_types::{Hash, Witness};
use std::collections::BTreeMap;

/// Why a contribution was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contribution {
    /// New valid signature recorded.
    Added,
    /// Same signature already recorded for this signer.
    Duplicate,
    /// Signer is not a member of the contract.
    NotMember,
    /// Signature does not verify against the transaction hash. Any earlier
    /// signature from the same signer is withdrawn.
    BadSignature,
}

/// Signature-assembly state for a candidate transaction.
#[derive(Debug, Clone)]
pub struct SignatureContext {
    tx_hash: Hash,
    contract: MultiSigContract,
    signatures: BTreeMap<Secp256k1PublicKey, Secp256k1Signature>,
}

impl SignatureContext {
    /// Start collecting signatures over `tx_hash`.
    pub fn new(tx_hash: Hash, contract: MultiSigContract) -> Self {
        Self {
            tx_hash,
            contract,
            signatures: BTreeMap::new(),
        }
    }

    /// Whether this context was seeded from the same transaction and contract.
    pub fn matches(&self, tx_hash: &Hash, contract: &MultiSigContract) -> bool {
        &self.tx_hash == tx_hash && &self.contract == contract
    }

    /// Contribute a signer's signature.
    pub fn add_signature(
        &mut self,
        signer: &Secp256k1PublicKey,
        signature: &Secp256k1Signature,
    ) -> Contribution {
        if !self.contract.contains(signer) {
            return Contribution::NotMember;
        }
        if self.signatures.get(signer) == Some(signature) {
            return Contribution::Duplicate;
        }
        if signer.verify(&self.tx_hash, signature).is_err() {
            self.signatures.remove(signer);
            return Contribution::BadSignature;
        }
        self.signatures.insert(*signer, *signature);
        Contribution::Added
    }

    /// Keep only signatures whose signer satisfies `current`.
    pub fn retain_signers(&mut self, mut current: impl FnMut(&Secp256k1PublicKey) -> bool) {
        self.signatures.retain(|signer, _| current(signer));
    }

    /// Valid signatures collected.
    pub fn collected(&self) -> usize {
        self.signatures.len()
    }

    /// Signatures required.
    pub fn required(&self) -> usize {
        self.contract.threshold()
    }

    /// Whether the threshold has been met.
    pub fn is_complete(&self) -> bool {
        self.collected() >= self.required()
    }

    /// The combined witness: the first `threshold` signatures in key order.
    pub fn witness(&self) -> Option<Witness> {
        if !self.is_complete() {
            return None;
        }
        let invocation: Vec<u8> = self
            .signatures
            .values()
            .take(self.required())
            .flat_map(|sig| sig.as_bytes().iter().copied())
            .collect();
        Some(Witness::new(invocation, self.contract.verification_script()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::keypairs;

    #[test]
    fn test_completes_at_threshold() {
        let pairs = keypairs(4);
        let keys: Vec<_> = pairs.iter().map(|p| p.public_key()).collect();
        let contract = MultiSigContract::with_quorum(&keys).unwrap();
        let tx_hash = [3u8; 32];
        let mut context = SignatureContext::new(tx_hash, contract.clone());

        for pair in &pairs[..2] {
            let sig = pair.sign(&tx_hash);
            assert_eq!(
                context.add_signature(&pair.public_key(), &sig),
                Contribution::Added
            );
        }
        assert!(!context.is_complete());
        assert!(context.witness().is_none());

        let sig = pairs[2].sign(&tx_hash);
        context.add_signature(&pairs[2].public_key(), &sig);
        let witness = context.witness().unwrap();

        assert!(contract.verify(&tx_hash, &witness.invocation));
        assert_eq!(witness.verification, contract.verification_script());
    }

    #[test]
    fn test_rejects_foreign_and_invalid_signatures() {
        let pairs = keypairs(5);
        let keys: Vec<_> = pairs[..4].iter().map(|p| p.public_key()).collect();
        let contract = MultiSigContract::with_quorum(&keys).unwrap();
        let tx_hash = [9u8; 32];
        let mut context = SignatureContext::new(tx_hash, contract);

        let outsider = &pairs[4];
        assert_eq!(
            context.add_signature(&outsider.public_key(), &outsider.sign(&tx_hash)),
            Contribution::NotMember
        );

        let signed_other = pairs[0].sign(&[1u8; 32]);
        assert_eq!(
            context.add_signature(&pairs[0].public_key(), &signed_other),
            Contribution::BadSignature
        );

        let good = pairs[0].sign(&tx_hash);
        context.add_signature(&pairs[0].public_key(), &good);
        assert_eq!(
            context.add_signature(&pairs[0].public_key(), &good),
            Contribution::Duplicate
        );
        assert_eq!(context.collected(), 1);
    }

    #[test]
    fn test_invalid_replacement_withdraws_signature() {
        let pairs = keypairs(4);
        let keys: Vec<_> = pairs.iter().map(|p| p.public_key()).collect();
        let contract = MultiSigContract::with_quorum(&keys).unwrap();
        let tx_hash = [4u8; 32];
        let mut context = SignatureContext::new(tx_hash, contract);

        let signer = pairs[1].public_key();
        context.add_signature(&signer, &pairs[1].sign(&tx_hash));
        assert_eq!(context.collected(), 1);

        assert_eq!(
            context.add_signature(&signer, &pairs[1].sign(&[5u8; 32])),
            Contribution::BadSignature
        );
        assert_eq!(context.collected(), 0);
    }
}
