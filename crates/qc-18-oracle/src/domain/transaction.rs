//! # Response Transaction
//!
//! Construction of the candidate response transaction every oracle node
//! builds independently. Identical inputs must yield an identical hash on
//! every node, so nothing here reads local state or randomness.

use shared_crypto::MultiSigContract;
use shared_types::encoding::write_var_bytes;
use shared_types::{
    OracleResponseAttribute, Transaction, TransactionAttribute, Witness, WitnessScope,
    MAX_VALID_UNTIL_BLOCK_INCREMENT, ORACLE_CONTRACT_ADDRESS,
};

/// Opcode prefix of a native contract call.
const CONTRACT_CALL: u8 = 0x41;

/// Method invoked on the oracle contract to deliver the response.
const CALLBACK_METHOD: &str = "callback";

/// Script calling the oracle contract's callback.
pub fn callback_script() -> Vec<u8> {
    let mut script = Vec::with_capacity(1 + 20 + 1 + CALLBACK_METHOD.len());
    script.push(CONTRACT_CALL);
    script.extend_from_slice(&ORACLE_CONTRACT_ADDRESS);
    write_var_bytes(&mut script, CALLBACK_METHOD.as_bytes());
    script
}

/// Unsigned candidate carrying `response`, witnessed by `contract`.
///
/// Fees are zero; the caller fills them after simulation.
pub fn build_response_transaction(
    response: OracleResponseAttribute,
    contract: &MultiSigContract,
    current_height: u32,
) -> Transaction {
    Transaction {
        version: 0,
        nonce: 0,
        sender: ORACLE_CONTRACT_ADDRESS,
        system_fee: 0,
        network_fee: 0,
        valid_until_block: current_height.saturating_add(MAX_VALID_UNTIL_BLOCK_INCREMENT),
        attributes: vec![
            TransactionAttribute::Cosigner {
                account: contract.script_hash(),
                allowed_contracts: vec![ORACLE_CONTRACT_ADDRESS],
                scope: WitnessScope::CalledByEntry,
            },
            TransactionAttribute::OracleResponse(response),
        ],
        script: callback_script(),
        witnesses: Vec::new(),
    }
}

/// Network fee for an unwitnessed `tx` once the `contract` witness is attached.
pub fn network_fee(tx: &Transaction, contract: &MultiSigContract, fee_per_byte: u64) -> u64 {
    let witness = Witness::new(
        vec![0u8; contract.invocation_len()],
        contract.verification_script(),
    );
    // witness count prefix is one byte for both 0 and 1
    let witnessed_size = tx.size() + witness.size();
    (witnessed_size as u64).saturating_mul(fee_per_byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::keypairs;

    fn contract(n: usize) -> MultiSigContract {
        let keys: Vec<_> = keypairs(n).iter().map(|p| p.public_key()).collect();
        MultiSigContract::with_quorum(&keys).unwrap()
    }

    #[test]
    fn test_candidate_is_deterministic() {
        let contract = contract(4);
        let response = OracleResponseAttribute::success([5u8; 32], b"[1]".to_vec(), 7);

        let a = build_response_transaction(response.clone(), &contract, 100);
        let b = build_response_transaction(response, &contract, 100);

        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.valid_until_block, 100 + MAX_VALID_UNTIL_BLOCK_INCREMENT);
        assert_eq!(a.sender, ORACLE_CONTRACT_ADDRESS);
    }

    #[test]
    fn test_cosigner_is_contract_address() {
        let contract = contract(4);
        let tx = build_response_transaction(
            OracleResponseAttribute::error([5u8; 32]),
            &contract,
            0,
        );

        match &tx.attributes[0] {
            TransactionAttribute::Cosigner {
                account,
                allowed_contracts,
                scope,
            } => {
                assert_eq!(*account, contract.script_hash());
                assert_eq!(allowed_contracts, &vec![ORACLE_CONTRACT_ADDRESS]);
                assert_eq!(*scope, WitnessScope::CalledByEntry);
            }
            other => panic!("unexpected attribute {:?}", other),
        }
        assert!(tx.oracle_response().unwrap().is_error());
    }

    #[test]
    fn test_network_fee_matches_witnessed_size() {
        let contract = contract(4);
        let mut tx = build_response_transaction(
            OracleResponseAttribute::success([5u8; 32], vec![1; 40], 0),
            &contract,
            0,
        );
        let fee = network_fee(&tx, &contract, 10);

        tx.witnesses = vec![Witness::new(
            vec![0u8; contract.invocation_len()],
            contract.verification_script(),
        )];
        assert_eq!(fee, tx.size() as u64 * 10);
    }
}
