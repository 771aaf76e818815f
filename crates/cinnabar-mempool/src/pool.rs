//! The mempool snapshot the replacement policy evaluates.
//!
//! [`MemPool`] owns the entry arena plus the two side indexes the policy
//! needs: which in-pool transaction spends a given output, and the
//! prioritisation deltas. The caller is responsible for serialising access;
//! every query here runs against the snapshot it is handed and mutates
//! nothing unless explicitly asked to.

use crate::arena::{EntryId, MemPoolArena, TxMemPoolEntry};
use crate::error::{MempoolError, TopologyError};
use crate::options::MemPoolOptions;
use crate::policy::{self, ConflictSet};
use bitcoin::{Amount, OutPoint, SignedAmount, Transaction, Txid};
use cinnabar_primitives::{build_diagram_from_chunks, FeeFrac};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// An unordered set of entry handles.
pub type EntrySet = HashSet<EntryId>;

/// In-memory pool of unconfirmed transactions, trimmed to what replacement
/// admission reads: the dependency graph, spent outputs and modified fees.
pub struct MemPool {
    pub(crate) arena: MemPoolArena,

    /// Which in-pool transaction spends a given output. Used for conflict
    /// discovery.
    map_next_tx: HashMap<OutPoint, Txid>,

    /// Prioritisation deltas by txid. A delta survives its transaction
    /// leaving the pool and is re-applied if the txid ever enters again.
    map_deltas: HashMap<Txid, SignedAmount>,
}

impl MemPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            arena: MemPoolArena::new(),
            map_next_tx: HashMap::new(),
            map_deltas: HashMap::new(),
        }
    }

    /// Add a transaction without running any policy checks.
    ///
    /// The caller asserts the transaction is valid and conflict-free; this
    /// only wires up the dependency graph and the spent-output index. The fee
    /// is supplied by the caller since the pool has no view of the UTXO set.
    pub fn add_unchecked(&mut self, tx: Transaction, fee: Amount) -> Result<EntryId, MempoolError> {
        let tx = Arc::new(tx);
        let txid = tx.compute_txid();
        if self.arena.get_by_txid(&txid).is_some() {
            return Err(MempoolError::AlreadyInMempool(txid));
        }

        let mut entry = TxMemPoolEntry::new(tx.clone(), fee);
        if let Some(delta) = self.map_deltas.get(&txid) {
            entry.modified_fee =
                SignedAmount::from_sat(entry.modified_fee.to_sat().saturating_add(delta.to_sat()));
        }

        let parents: EntrySet = tx
            .input
            .iter()
            .filter_map(|txin| self.arena.get_by_txid(&txin.previous_output.txid))
            .collect();
        entry.parents = parents.clone();

        let id = self.arena.insert(entry);
        for &parent_id in &parents {
            self.entry_mut(parent_id).children.insert(id);
        }
        for txin in &tx.input {
            self.map_next_tx.insert(txin.previous_output, txid);
        }

        tracing::trace!(target: "txpool", %txid, "Added transaction");
        Ok(id)
    }

    /// Adjust a transaction's modified fee by `delta` satoshis.
    ///
    /// Applies to the entry if present and is remembered for the txid either
    /// way. Negative deltas are legal.
    pub fn prioritise_transaction(&mut self, txid: &Txid, delta: SignedAmount) {
        let accumulated = self
            .map_deltas
            .entry(*txid)
            .or_insert(SignedAmount::ZERO);
        *accumulated = SignedAmount::from_sat(accumulated.to_sat().saturating_add(delta.to_sat()));

        if let Some(id) = self.arena.get_by_txid(txid) {
            let entry = self.entry_mut(id);
            entry.modified_fee =
                SignedAmount::from_sat(entry.modified_fee.to_sat().saturating_add(delta.to_sat()));
        }
        tracing::debug!(target: "txpool", %txid, delta = delta.to_sat(), "Prioritised transaction");
    }

    /// Look up an entry handle by txid.
    pub fn get_by_txid(&self, txid: &Txid) -> Option<EntryId> {
        self.arena.get_by_txid(txid)
    }

    /// Whether a transaction with this txid is in the pool.
    pub fn contains_txid(&self, txid: &Txid) -> bool {
        self.arena.get_by_txid(txid).is_some()
    }

    /// Get an entry by handle.
    pub fn get(&self, id: EntryId) -> Option<&TxMemPoolEntry> {
        self.arena.get(id)
    }

    /// Get an entry by handle, which must be valid.
    pub(crate) fn entry(&self, id: EntryId) -> &TxMemPoolEntry {
        self.arena.get(id).expect("entry handle must be valid")
    }

    fn entry_mut(&mut self, id: EntryId) -> &mut TxMemPoolEntry {
        self.arena.get_mut(id).expect("entry handle must be valid")
    }

    /// The accumulated prioritisation delta for a txid, in satoshis.
    pub fn fee_delta(&self, txid: &Txid) -> i64 {
        self.map_deltas.get(txid).map_or(0, |delta| delta.to_sat())
    }

    /// Which in-pool transaction spends `outpoint`, if any.
    pub fn get_conflict_tx(&self, outpoint: &OutPoint) -> Option<Txid> {
        self.map_next_tx.get(outpoint).copied()
    }

    /// Pool entries that spend an output `tx` also spends.
    pub fn direct_conflicts(&self, tx: &Transaction) -> EntrySet {
        let mut conflicts = EntrySet::new();
        for txin in &tx.input {
            if let Some(conflicting_txid) = self.get_conflict_tx(&txin.previous_output) {
                if let Some(id) = self.arena.get_by_txid(&conflicting_txid) {
                    conflicts.insert(id);
                }
            }
        }
        conflicts
    }

    /// Collect an entry and all of its in-pool descendants into `descendants`.
    pub fn calculate_descendants(&self, id: EntryId, descendants: &mut EntrySet) {
        if !descendants.insert(id) {
            return;
        }
        if let Some(entry) = self.arena.get(id) {
            for &child_id in &entry.children {
                self.calculate_descendants(child_id, descendants);
            }
        }
    }

    /// Collect an entry and all of its in-pool ancestors into `ancestors`.
    pub fn calculate_ancestors(&self, id: EntryId, ancestors: &mut EntrySet) {
        if !ancestors.insert(id) {
            return;
        }
        if let Some(entry) = self.arena.get(id) {
            for &parent_id in &entry.parents {
                self.calculate_ancestors(parent_id, ancestors);
            }
        }
    }

    /// Number of transactions in the pool.
    pub fn size(&self) -> usize {
        self.arena.len()
    }

    /// Remove a set of entries, unlinking them from the graph and the
    /// spent-output index.
    pub fn remove_staged(&mut self, to_remove: &EntrySet) {
        for &id in to_remove {
            let Some(entry) = self.arena.remove(id) else {
                continue;
            };
            for txin in &entry.tx.input {
                self.map_next_tx.remove(&txin.previous_output);
            }
            for &parent_id in &entry.parents {
                if let Some(parent) = self.arena.get_mut(parent_id) {
                    parent.children.remove(&id);
                }
            }
            for &child_id in &entry.children {
                if let Some(child) = self.arena.get_mut(child_id) {
                    child.parents.remove(&id);
                }
            }
        }
        tracing::debug!(target: "txpool", count = to_remove.len(), "Removed transactions");
    }

    /// Validate `tx` as a replacement and, if every check passes, evict the
    /// conflict closure and insert it.
    pub fn accept_replacement(
        &mut self,
        tx: Transaction,
        fee: Amount,
        options: &MemPoolOptions,
    ) -> Result<ConflictSet, MempoolError> {
        let conflict_set = policy::check_replacement(self, options, &tx, fee)?;
        self.remove_staged(&conflict_set.all_conflicts);
        self.add_unchecked(tx, fee)?;
        Ok(conflict_set)
    }

    /// Entries of `set` in txid order, so that per-entry reporting is
    /// deterministic regardless of set iteration order.
    pub(crate) fn sorted_by_txid(&self, set: &EntrySet) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = set.iter().copied().collect();
        ids.sort_by_key(|&id| self.entry(id).txid());
        ids
    }

    /// Accept only conflict shapes for which the two-chunk diagram
    /// construction is exact: every direct conflict must be a singleton, the
    /// sole parent of a single child, or the sole child of a single parent.
    pub fn check_conflict_topology(&self, direct_conflicts: &EntrySet) -> Result<(), TopologyError> {
        for id in self.sorted_by_txid(direct_conflicts) {
            let entry = self.entry(id);
            let txid = entry.txid();

            // Closure counts include the entry itself.
            let mut ancestors = EntrySet::new();
            self.calculate_ancestors(id, &mut ancestors);
            let mut descendants = EntrySet::new();
            self.calculate_descendants(id, &mut descendants);
            let ancestor_count = ancestors.len() as u64;
            let descendant_count = descendants.len() as u64;
            let has_ancestor = ancestor_count > 1;
            let has_descendant = descendant_count > 1;

            if ancestor_count > 2 {
                return Err(TopologyError::TooManyAncestors { txid, count: ancestor_count - 1 });
            }
            if descendant_count > 2 {
                return Err(TopologyError::TooManyDescendants {
                    txid,
                    count: descendant_count - 1,
                });
            }
            if has_ancestor && has_descendant {
                return Err(TopologyError::AncestorAndDescendant { txid });
            }

            if has_descendant {
                let &child_id = entry.children.iter().next().expect("entry has a descendant");
                let child = self.entry(child_id);
                if child.parents.len() > 1 {
                    return Err(TopologyError::NotOnlyParent { txid, child: child.txid() });
                }
            } else if has_ancestor {
                let &parent_id = entry.parents.iter().next().expect("entry has an ancestor");
                let parent = self.entry(parent_id);
                if parent.children.len() > 1 {
                    return Err(TopologyError::NotOnlyChild { txid, parent: parent.txid() });
                }
            }
        }
        Ok(())
    }

    /// Build the before/after feerate diagrams for replacing `all_conflicts`
    /// (the descendant closure of `direct_conflicts`) with a single chunk of
    /// `replacement_fees` and `replacement_vsize`.
    ///
    /// The old diagram covers every cluster touching the conflicts; the new
    /// diagram keeps the residual chunk of any cluster that only loses its
    /// child, and adds the replacement chunk. Pure: reads the snapshot,
    /// mutates nothing.
    pub fn calculate_feerate_diagrams_for_rbf(
        &self,
        replacement_fees: i64,
        replacement_vsize: i64,
        direct_conflicts: &EntrySet,
        all_conflicts: &EntrySet,
    ) -> Result<(Vec<FeeFrac>, Vec<FeeFrac>), TopologyError> {
        debug_assert!(replacement_vsize > 0);

        self.check_conflict_topology(direct_conflicts)?;

        // Under the topology bound every affected cluster is one or two
        // entries, so its linearization is trivial. Emit each cluster's
        // chunks at the childmost conflicted entry so a pair is chunked once.
        let mut old_chunks = Vec::with_capacity(all_conflicts.len() + 1);
        for id in self.sorted_by_txid(all_conflicts) {
            let entry = self.entry(id);
            if !entry.children().is_empty() {
                // The pair is emitted when we visit the child.
                continue;
            }
            let individual = entry.fee_frac();
            if let Some(&parent_id) = entry.parents().iter().next() {
                let package = individual + self.entry(parent_id).fee_frac();
                if individual.feerate_cmp(&package) == Ordering::Greater {
                    // The child outpays its parent, so the linearization
                    // mines the pair as one chunk. On an exact feerate tie
                    // the parent and child stay separate chunks.
                    old_chunks.push(package);
                } else {
                    old_chunks.push(package - individual);
                    old_chunks.push(individual);
                }
            } else {
                old_chunks.push(individual);
            }
        }
        old_chunks.sort_by(|a, b| b.cmp(a));

        // A cluster that only loses its child keeps the parent around; its
        // chunk carries over into the new diagram.
        let mut new_chunks = Vec::with_capacity(direct_conflicts.len() + 1);
        for id in self.sorted_by_txid(direct_conflicts) {
            if let Some(&parent_id) = self.entry(id).parents().iter().next() {
                if !all_conflicts.contains(&parent_id) {
                    new_chunks.push(self.entry(parent_id).fee_frac());
                }
            }
        }
        new_chunks.push(FeeFrac::new(replacement_fees, replacement_vsize));
        new_chunks.sort_by(|a, b| b.cmp(a));

        Ok((
            build_diagram_from_chunks(&old_chunks),
            build_diagram_from_chunks(&new_chunks),
        ))
    }
}

impl Default for MemPool {
    fn default() -> Self {
        Self::new()
    }
}
