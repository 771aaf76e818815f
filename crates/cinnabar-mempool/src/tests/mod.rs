//! Shared fixtures for the replacement policy suite.

use crate::{EntryId, EntrySet, MemPool};
use bitcoin::hashes::Hash;
use bitcoin::{
    absolute, transaction, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};


pub(crate) const CENT: i64 = 1_000_000;
pub(crate) const COIN: i64 = 100_000_000;

pub(crate) const LOW_FEE: i64 = CENT / 100;
pub(crate) const NORMAL_FEE: i64 = CENT / 10;
pub(crate) const HIGH_FEE: i64 = CENT;

/// Sequence that opts in to BIP125 replaceability.
pub(crate) const RBF_SEQUENCE: u32 = 0xFFFF_FFFD;
/// Sequence that does not signal replaceability.
pub(crate) const NO_RBF_SEQUENCE: u32 = 0xFFFF_FFFE;

/// Outpoint of a confirmed coin, distinct per index. Anything not spent by a
/// pool transaction counts as confirmed for the policy.
pub(crate) fn confirmed_outpoint(index: u8) -> OutPoint {
    OutPoint {
        txid: Txid::from_byte_array([index.wrapping_add(1); 32]),
        vout: 0,
    }
}

pub(crate) fn make_tx_with_sequence(
    inputs: &[OutPoint],
    output_values: &[i64],
    sequence: u32,
) -> Transaction {
    Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: inputs
            .iter()
            .map(|&previous_output| TxIn {
                previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence(sequence),
                witness: Witness::new(),
            })
            .collect(),
        output: output_values
            .iter()
            .map(|&value| TxOut {
                value: Amount::from_sat(value as u64),
                script_pubkey: ScriptBuf::new(),
            })
            .collect(),
    }
}

pub(crate) fn make_tx(inputs: &[OutPoint], output_values: &[i64]) -> Transaction {
    make_tx_with_sequence(inputs, output_values, RBF_SEQUENCE)
}

pub(crate) fn output_of(tx: &Transaction, vout: u32) -> OutPoint {
    OutPoint {
        txid: tx.compute_txid(),
        vout,
    }
}

pub(crate) fn add_tx(pool: &mut MemPool, tx: &Transaction, fee: i64) -> EntryId {
    pool.add_unchecked(tx.clone(), Amount::from_sat(fee as u64))
        .unwrap()
}

/// Chain `count` descendants under `tx`, each spending the previous one.
/// Returns the final descendant.
pub(crate) fn add_descendants(
    pool: &mut MemPool,
    tx: &Transaction,
    count: u32,
    fee: i64,
) -> Transaction {
    let mut tx_to_spend = tx.clone();
    for i in 0..count {
        let next = make_tx(&[output_of(&tx_to_spend, 0)], &[(200 - i as i64) * CENT]);
        add_tx(pool, &next, fee);
        tx_to_spend = next;
    }
    tx_to_spend
}

pub(crate) fn set(ids: &[EntryId]) -> EntrySet {
    ids.iter().copied().collect()
}
