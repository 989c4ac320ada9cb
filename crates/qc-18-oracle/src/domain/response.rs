//! # Response Collection
//!
//! Latest signed opinion per oracle signer for one request.
//!
//! ## Ordering Law
//!
//! Each signer holds at most one item. A newer item (`received_at` strictly
//! greater) replaces the stored one; an equal or older one is a no-op, so
//! duplicate and out-of-order delivery converge.

use shared_crypto::{Secp256k1PublicKey, Secp256k1Signature};
use shared_types::Transaction;
use std::collections::HashMap;

/// Timestamp in milliseconds.
pub type Millis = u64;

/// One signer's partial response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseItem {
    /// Signer identity.
    pub signer: Secp256k1PublicKey,
    /// Signature over the candidate response transaction hash.
    pub signature: Secp256k1Signature,
    /// The candidate transaction, present only when this node built it.
    pub transaction: Option<Transaction>,
    /// When this node received (or produced) the item.
    pub received_at: Millis,
}

impl ResponseItem {
    /// Item produced by a local oracle account.
    pub fn local(
        signer: Secp256k1PublicKey,
        signature: Secp256k1Signature,
        transaction: Transaction,
        received_at: Millis,
    ) -> Self {
        Self {
            signer,
            signature,
            transaction: Some(transaction),
            received_at,
        }
    }

    /// Item received from a peer.
    pub fn remote(
        signer: Secp256k1PublicKey,
        signature: Secp256k1Signature,
        received_at: Millis,
    ) -> Self {
        Self {
            signer,
            signature,
            transaction: None,
            received_at,
        }
    }

    /// Whether this node built the candidate transaction.
    pub fn is_local(&self) -> bool {
        self.transaction.is_some()
    }
}

/// Signer → latest response item.
#[derive(Debug, Clone, Default)]
pub struct ResponseCollection {
    items: HashMap<Secp256k1PublicKey, ResponseItem>,
}

impl ResponseCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by timestamp. Returns `true` if the collection changed.
    pub fn add(&mut self, item: ResponseItem) -> bool {
        match self.items.get(&item.signer) {
            Some(existing) if existing.received_at >= item.received_at => false,
            _ => {
                self.items.insert(item.signer, item);
                true
            }
        }
    }

    /// Drop every item whose signer is not in `authorized`.
    ///
    /// Returns the number of items removed.
    pub fn prune_to(&mut self, authorized: &[Secp256k1PublicKey]) -> usize {
        let before = self.items.len();
        self.items.retain(|signer, _| authorized.contains(signer));
        before - self.items.len()
    }

    /// The item carrying this node's candidate transaction.
    ///
    /// With several local accounts the most recent one wins; ties fall back
    /// to the smallest signer key so the choice is deterministic.
    pub fn local_item(&self) -> Option<&ResponseItem> {
        self.items
            .values()
            .filter(|item| item.is_local())
            .max_by(|a, b| {
                a.received_at
                    .cmp(&b.received_at)
                    .then_with(|| b.signer.cmp(&a.signer))
            })
    }

    /// Item stored for `signer`.
    pub fn get(&self, signer: &Secp256k1PublicKey) -> Option<&ResponseItem> {
        self.items.get(signer)
    }

    /// Number of signers with an item.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no signer has contributed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current items, unordered.
    pub fn iter(&self) -> impl Iterator<Item = &ResponseItem> {
        self.items.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{keypair, keypairs};
    use proptest::prelude::*;

    fn remote(seed: u8, received_at: Millis) -> ResponseItem {
        let pair = keypair(seed);
        ResponseItem::remote(pair.public_key(), pair.sign(&[seed]), received_at)
    }

    #[test]
    fn test_newer_item_replaces() {
        let mut collection = ResponseCollection::new();
        assert!(collection.add(remote(1, 100)));
        assert!(collection.add(remote(1, 200)));

        assert_eq!(collection.len(), 1);
        let signer = remote(1, 0).signer;
        assert_eq!(collection.get(&signer).unwrap().received_at, 200);
    }

    #[test]
    fn test_older_or_equal_item_is_noop() {
        let mut collection = ResponseCollection::new();
        collection.add(remote(1, 200));

        assert!(!collection.add(remote(1, 100)));
        assert!(!collection.add(remote(1, 200)));
        let signer = remote(1, 0).signer;
        assert_eq!(collection.get(&signer).unwrap().received_at, 200);
    }

    #[test]
    fn test_prune_removes_unauthorized() {
        let mut collection = ResponseCollection::new();
        collection.add(remote(1, 1));
        collection.add(remote(2, 1));
        collection.add(remote(3, 1));

        let keep = vec![remote(1, 0).signer, remote(3, 0).signer];
        assert_eq!(collection.prune_to(&keep), 1);
        assert_eq!(collection.len(), 2);
        assert!(collection.iter().all(|item| keep.contains(&item.signer)));
    }

    #[test]
    fn test_local_item_lookup() {
        let pairs = keypairs(2);
        let mut collection = ResponseCollection::new();
        collection.add(ResponseItem::remote(
            pairs[0].public_key(),
            pairs[0].sign(b"x"),
            5,
        ));
        assert!(collection.local_item().is_none());

        let tx = crate::test_utils::sample_transaction([7u8; 32]);
        collection.add(ResponseItem::local(
            pairs[1].public_key(),
            pairs[1].sign(b"x"),
            tx,
            6,
        ));
        assert_eq!(
            collection.local_item().unwrap().signer,
            pairs[1].public_key()
        );
    }

    proptest! {
        #[test]
        fn prop_latest_timestamp_wins(stamps in proptest::collection::vec(0u64..1000, 1..20)) {
            let mut collection = ResponseCollection::new();
            for stamp in &stamps {
                collection.add(remote(1, *stamp));
            }
            let signer = remote(1, 0).signer;
            let max = stamps.iter().copied().max().unwrap();
            prop_assert_eq!(collection.len(), 1);
            prop_assert_eq!(collection.get(&signer).unwrap().received_at, max);
        }
    }
}
