//! Replace-By-Fee policy checks.
//!
//! A transaction that spends an output some pool entry also spends may evict
//! that entry (and its descendants) if it pays enough more. The rules here
//! exist to keep replacement honest: cheap transactions must not evict
//! expensive ones, and an attacker must not be able to force unbounded
//! revalidation work or pin a transaction in the pool by giving it awkward
//! relatives.
//!
//! All predicates are pure queries against a pool snapshot. The composed
//! driver [`check_replacement`] runs them in a fixed order; the order only
//! determines which reason a user sees when several rules would reject.

use crate::error::{DiagramCheckError, MempoolError, RbfError};
use crate::options::MemPoolOptions;
use crate::pool::{EntrySet, MemPool};
use bitcoin::{Amount, SignedAmount, Transaction, Txid};
use cinnabar_primitives::{compare_feerate_diagram, FeeFrac, FeeRate};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Maximum number of pool entries a single replacement may evict.
pub const MAX_REPLACEMENT_CANDIDATES: usize = 100;

/// Largest cluster the feerate diagram construction can evaluate: one parent
/// and one child.
pub const MAX_CLUSTER_COUNT_REPLACEABLE: usize = 2;

/// Everything the caller needs to apply an accepted replacement.
#[derive(Debug, Clone)]
pub struct ConflictSet {
    /// Entries spending an output the replacement also spends.
    pub direct_conflicts: EntrySet,

    /// Direct conflicts plus all of their in-pool descendants: the full
    /// eviction set.
    pub all_conflicts: EntrySet,

    /// Sum of the evicted entries' modified fees, in satoshis.
    pub replaced_fees: SignedAmount,

    /// Sum of the evicted entries' virtual sizes.
    pub replaced_size: i64,
}

/// Require the replacement feerate to strictly beat every direct conflict's
/// own feerate.
///
/// Individual feerates, not ancestor feerates: a low-feerate parent must not
/// be replaceable purely on the strength of a high-feerate child, and the
/// other way around. Modified fees throughout.
pub fn pays_more_than_conflicts(
    pool: &MemPool,
    iters_conflicting: &EntrySet,
    replacement_feerate: FeeFrac,
    txid: &Txid,
) -> Result<(), RbfError> {
    for id in pool.sorted_by_txid(iters_conflicting) {
        let original_feerate = pool.entry(id).fee_frac();
        if replacement_feerate.feerate_cmp(&original_feerate) != Ordering::Greater {
            return Err(RbfError::NotBetterFeerate {
                txid: *txid,
                new_feerate: replacement_feerate,
                old_feerate: original_feerate,
            });
        }
    }
    Ok(())
}

/// Require the replacement to pay at least the fees it evicts, plus enough
/// additional fee to cover relaying its own bytes at `relay_feerate`.
///
/// The evicted transactions already consumed network bandwidth; their fees
/// must not simply vanish, and the replacement's bytes are new traffic that
/// has to be paid for on top.
pub fn pays_for_rbf(
    original_fees: i64,
    replacement_fees: i64,
    replacement_vsize: i64,
    relay_feerate: FeeRate,
    txid: &Txid,
) -> Result<(), RbfError> {
    if replacement_fees < original_fees {
        return Err(RbfError::LessFeesThanConflicts {
            txid: *txid,
            replacement_fees,
            original_fees,
        });
    }

    let additional_fees = replacement_fees - original_fees;
    let required_fee = relay_feerate.fee_for(replacement_vsize);
    if additional_fees < required_fee {
        return Err(RbfError::InsufficientIncrementalFee {
            txid: *txid,
            additional_fees,
            required_fee,
        });
    }
    Ok(())
}

/// Forbid a replacement from spending an output of a transaction it
/// conflicts with.
///
/// No descendant expansion happens here: the check runs against exactly the
/// conflict set the caller computed.
pub fn entries_and_txids_disjoint(
    pool: &MemPool,
    direct_conflicts: &EntrySet,
    parent_txids: &HashSet<Txid>,
    txid: &Txid,
) -> Result<(), RbfError> {
    for id in pool.sorted_by_txid(direct_conflicts) {
        let conflict_txid = pool.entry(id).txid();
        if parent_txids.contains(&conflict_txid) {
            return Err(RbfError::SpendsConflictingTx {
                txid: *txid,
                conflict: conflict_txid,
            });
        }
    }
    Ok(())
}

/// Expand the direct conflicts to their descendant closure, the set of
/// entries a replacement would evict.
///
/// Caps the closure at [`MAX_REPLACEMENT_CANDIDATES`] to bound the work a
/// single replacement can force on the node.
pub fn get_entries_for_conflicts(
    pool: &MemPool,
    txid: &Txid,
    direct_conflicts: &EntrySet,
    all_conflicts: &mut EntrySet,
) -> Result<(), RbfError> {
    for &id in direct_conflicts {
        pool.calculate_descendants(id, all_conflicts);
    }
    if all_conflicts.len() > MAX_REPLACEMENT_CANDIDATES {
        return Err(RbfError::TooManyReplacements {
            txid: *txid,
            count: all_conflicts.len(),
            limit: MAX_REPLACEMENT_CANDIDATES,
        });
    }
    Ok(())
}

/// Forbid the replacement from spending unconfirmed outputs outside the
/// conflict set.
///
/// If a replacement leans on a new unconfirmed ancestor, its effective
/// feerate depends on transactions the conflict set says nothing about,
/// which opens the door to round-trip pinning. Confirmed outputs are always
/// fine, and so are outputs of the entries being replaced.
pub fn has_no_new_unconfirmed(
    pool: &MemPool,
    tx: &Transaction,
    iters_conflicting: &EntrySet,
) -> Result<(), RbfError> {
    for (index, txin) in tx.input.iter().enumerate() {
        if let Some(id) = pool.get_by_txid(&txin.previous_output.txid) {
            if !iters_conflicting.contains(&id) {
                return Err(RbfError::NewUnconfirmedInput {
                    txid: tx.compute_txid(),
                    index,
                });
            }
        }
    }
    Ok(())
}

/// Require the replacement to strictly improve the pool's feerate diagram.
///
/// Builds the before/after diagrams for the affected clusters and compares
/// them. A topology the diagram construction cannot express yields
/// [`DiagramCheckError::Uncalculable`] with the topology reason; a diagram
/// that is not strictly better yields [`DiagramCheckError::NotImproved`].
pub fn improves_feerate_diagram(
    pool: &MemPool,
    direct_conflicts: &EntrySet,
    all_conflicts: &EntrySet,
    replacement_fees: i64,
    replacement_vsize: i64,
) -> Result<(), DiagramCheckError> {
    let (old_diagram, new_diagram) = pool
        .calculate_feerate_diagrams_for_rbf(
            replacement_fees,
            replacement_vsize,
            direct_conflicts,
            all_conflicts,
        )
        .map_err(DiagramCheckError::Uncalculable)?;

    match compare_feerate_diagram(&old_diagram, &new_diagram) {
        Some(Ordering::Less) => Ok(()),
        _ => Err(DiagramCheckError::NotImproved),
    }
}

/// Run the full replacement pipeline for `tx` against the pool snapshot.
///
/// Order: conflict discovery and replaceability signaling, conflict
/// topology, the conflict-shape predicates, the fee predicates, and finally
/// the diagram comparison. Returns the eviction set and its totals so the
/// caller can apply the replacement.
pub fn check_replacement(
    pool: &MemPool,
    options: &MemPoolOptions,
    tx: &Transaction,
    base_fee: Amount,
) -> Result<ConflictSet, MempoolError> {
    let txid = tx.compute_txid();

    let direct_conflicts = pool.direct_conflicts(tx);
    if direct_conflicts.is_empty() {
        return Err(MempoolError::NoConflictToReplace(txid));
    }

    if !options.full_rbf {
        for id in pool.sorted_by_txid(&direct_conflicts) {
            let entry = pool.entry(id);
            if !entry.signals_rbf() {
                return Err(MempoolError::NotReplaceable(entry.txid()));
            }
        }
    }

    pool.check_conflict_topology(&direct_conflicts)
        .map_err(|err| MempoolError::Diagram(DiagramCheckError::Uncalculable(err)))?;

    let parent_txids: HashSet<Txid> = tx
        .input
        .iter()
        .map(|txin| txin.previous_output.txid)
        .collect();
    entries_and_txids_disjoint(pool, &direct_conflicts, &parent_txids, &txid)?;
    has_no_new_unconfirmed(pool, tx, &direct_conflicts)?;

    let mut all_conflicts = EntrySet::new();
    get_entries_for_conflicts(pool, &txid, &direct_conflicts, &mut all_conflicts)?;

    // The candidate's prioritisation delta applies just like an entry's.
    let replacement_fees = base_fee.to_sat() as i64 + pool.fee_delta(&txid);
    let replacement_vsize = tx.weight().to_vbytes_ceil() as i64;

    pays_more_than_conflicts(
        pool,
        &direct_conflicts,
        FeeFrac::new(replacement_fees, replacement_vsize),
        &txid,
    )?;

    let replaced_fees: i64 = all_conflicts
        .iter()
        .map(|&id| pool.entry(id).modified_fee().to_sat())
        .sum();
    let replaced_size: i64 = all_conflicts.iter().map(|&id| pool.entry(id).vsize()).sum();
    pays_for_rbf(
        replaced_fees,
        replacement_fees,
        replacement_vsize,
        options.incremental_relay_feerate,
        &txid,
    )?;

    improves_feerate_diagram(
        pool,
        &direct_conflicts,
        &all_conflicts,
        replacement_fees,
        replacement_vsize,
    )?;

    tracing::debug!(
        target: "rbf",
        %txid,
        replaced = all_conflicts.len(),
        "Replacement passes all checks"
    );
    Ok(ConflictSet {
        direct_conflicts,
        all_conflicts,
        replaced_fees: SignedAmount::from_sat(replaced_fees),
        replaced_size,
    })
}
