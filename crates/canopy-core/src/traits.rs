//! Trait interfaces between the ledger core and its collaborators.
//!
//! - [`TransactionVerifier`] — per-transaction validity predicate consulted
//!   while a block's inputs are checked. Signature and script rules live
//!   behind this seam; the core never inspects signature bytes itself.

use std::collections::HashSet;

use crate::ledger::UtxoPool;
use crate::types::Transaction;

/// External validity predicate for a non-coinbase transaction.
///
/// Called with the working ledger of the block being validated, before the
/// transaction's own inputs are consumed. Returning `false` rejects the
/// whole block.
pub trait TransactionVerifier: Send + Sync {
    fn verify(&self, tx: &Transaction, ledger: &UtxoPool) -> bool;
}

/// Treats signature and value checks as a precondition already satisfied
/// upstream. Input presence and double spends are still enforced by the
/// validator.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl TransactionVerifier for AcceptAll {
    fn verify(&self, _tx: &Transaction, _ledger: &UtxoPool) -> bool {
        true
    }
}

/// Value conservation rules:
/// - every input is present in the ledger
/// - no outpoint is claimed twice by the same transaction
/// - output values do not overflow
/// - the inputs cover the outputs
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueConservation;

impl TransactionVerifier for ValueConservation {
    fn verify(&self, tx: &Transaction, ledger: &UtxoPool) -> bool {
        let mut seen = HashSet::with_capacity(tx.inputs.len());
        let mut total_in: u64 = 0;
        for input in &tx.inputs {
            if !seen.insert(&input.previous_output) {
                return false;
            }
            let Some(output) = ledger.get(&input.previous_output) else {
                return false;
            };
            total_in = match total_in.checked_add(output.value) {
                Some(sum) => sum,
                None => return false,
            };
        }
        match tx.total_output_value() {
            Some(total_out) => total_in >= total_out,
            None => false,
        }
    }
}

impl<F> TransactionVerifier for F
where
    F: Fn(&Transaction, &UtxoPool) -> bool + Send + Sync,
{
    fn verify(&self, tx: &Transaction, ledger: &UtxoPool) -> bool {
        self(tx, ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hash256, OutPoint, TxInput, TxOutput};

    fn funded_ledger() -> UtxoPool {
        let mut ledger = UtxoPool::new();
        ledger.add_utxo(
            OutPoint::new(Hash256([1; 32]), 0),
            TxOutput { value: 10, owner: Hash256([9; 32]) },
        );
        ledger
    }

    fn spend(outpoints: &[OutPoint], value: u64) -> Transaction {
        Transaction {
            version: 1,
            inputs: outpoints
                .iter()
                .map(|op| TxInput { previous_output: op.clone(), signature: vec![] })
                .collect(),
            outputs: vec![TxOutput { value, owner: Hash256([7; 32]) }],
            lock_time: 0,
        }
    }

    #[test]
    fn accept_all_accepts_anything() {
        let tx = spend(&[OutPoint::new(Hash256([5; 32]), 0)], u64::MAX);
        assert!(AcceptAll.verify(&tx, &UtxoPool::new()));
    }

    #[test]
    fn conservation_accepts_balanced_spend() {
        let op = OutPoint::new(Hash256([1; 32]), 0);
        assert!(ValueConservation.verify(&spend(&[op], 10), &funded_ledger()));
    }

    #[test]
    fn conservation_rejects_inflation() {
        let op = OutPoint::new(Hash256([1; 32]), 0);
        assert!(!ValueConservation.verify(&spend(&[op], 11), &funded_ledger()));
    }

    #[test]
    fn conservation_rejects_missing_input() {
        let op = OutPoint::new(Hash256([2; 32]), 0);
        assert!(!ValueConservation.verify(&spend(&[op], 1), &funded_ledger()));
    }

    #[test]
    fn conservation_rejects_repeated_input() {
        let op = OutPoint::new(Hash256([1; 32]), 0);
        assert!(!ValueConservation.verify(&spend(&[op.clone(), op], 20), &funded_ledger()));
    }

    #[test]
    fn closures_are_verifiers() {
        let deny = |_: &Transaction, _: &UtxoPool| false;
        let op = OutPoint::new(Hash256([1; 32]), 0);
        assert!(!deny.verify(&spend(&[op], 1), &funded_ledger()));
    }
}
