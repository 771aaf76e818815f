//! Arena-based storage for mempool entries.
//!
//! Entries live in a SlotMap and refer to each other through copyable
//! handles, avoiding reference cycles between parents and children. Handle
//! equality is identity: two entries with the same fee and size are still
//! distinct.

use bitcoin::{Amount, OutPoint, SignedAmount, Transaction, Txid, Weight};
use cinnabar_primitives::FeeFrac;
use slotmap::{DefaultKey, SlotMap};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Handle to an entry in the mempool arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub(crate) DefaultKey);

/// A pool transaction together with the fee state the policy reads.
pub struct TxMemPoolEntry {
    /// Transaction data.
    pub(crate) tx: Arc<Transaction>,

    /// Base fee, without prioritisation.
    pub(crate) fee: Amount,

    /// Base fee plus the prioritisation delta. Every policy decision reads
    /// this, never the base fee. Deltas may be negative.
    pub(crate) modified_fee: SignedAmount,

    /// Cached transaction weight.
    pub(crate) tx_weight: Weight,

    /// In-pool parents.
    pub(crate) parents: HashSet<EntryId>,

    /// In-pool children.
    pub(crate) children: HashSet<EntryId>,
}

impl TxMemPoolEntry {
    pub(crate) fn new(tx: Arc<Transaction>, fee: Amount) -> Self {
        let tx_weight = tx.weight();
        Self {
            tx,
            fee,
            modified_fee: SignedAmount::from_sat(fee.to_sat() as i64),
            tx_weight,
            parents: HashSet::new(),
            children: HashSet::new(),
        }
    }

    /// Transaction id.
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// The underlying transaction.
    pub fn tx(&self) -> &Arc<Transaction> {
        &self.tx
    }

    /// Base fee, without prioritisation.
    pub fn base_fee(&self) -> Amount {
        self.fee
    }

    /// Base fee plus the prioritisation delta.
    pub fn modified_fee(&self) -> SignedAmount {
        self.modified_fee
    }

    /// Transaction virtual size in bytes.
    pub fn vsize(&self) -> i64 {
        self.tx_weight.to_vbytes_ceil() as i64
    }

    /// The entry's own feerate as an exact fraction of modified fee over
    /// virtual size.
    pub fn fee_frac(&self) -> FeeFrac {
        FeeFrac::new(self.modified_fee.to_sat(), self.vsize())
    }

    /// In-pool parents.
    pub fn parents(&self) -> &HashSet<EntryId> {
        &self.parents
    }

    /// In-pool children.
    pub fn children(&self) -> &HashSet<EntryId> {
        &self.children
    }

    /// Whether the transaction signals BIP125 replaceability: at least one
    /// input has a sequence below 0xFFFFFFFE.
    pub fn signals_rbf(&self) -> bool {
        self.tx.input.iter().any(|txin| txin.sequence.is_rbf())
    }

    /// Outputs this transaction spends.
    pub fn spent_outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.tx.input.iter().map(|txin| txin.previous_output)
    }
}

/// Arena holding all mempool entries, indexed by txid.
pub struct MemPoolArena {
    /// Primary storage: handle -> entry.
    entries: SlotMap<DefaultKey, TxMemPoolEntry>,

    /// Index by transaction id.
    by_txid: HashMap<Txid, EntryId>,
}

impl MemPoolArena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        Self {
            entries: SlotMap::new(),
            by_txid: HashMap::new(),
        }
    }

    /// Insert a new entry and return its handle.
    pub fn insert(&mut self, entry: TxMemPoolEntry) -> EntryId {
        let txid = entry.txid();
        let id = EntryId(self.entries.insert(entry));
        self.by_txid.insert(txid, id);
        id
    }

    /// Get an entry by handle.
    pub fn get(&self, id: EntryId) -> Option<&TxMemPoolEntry> {
        self.entries.get(id.0)
    }

    /// Get an entry by handle, mutably.
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut TxMemPoolEntry> {
        self.entries.get_mut(id.0)
    }

    /// Look up an entry handle by txid.
    pub fn get_by_txid(&self, txid: &Txid) -> Option<EntryId> {
        self.by_txid.get(txid).copied()
    }

    /// Remove an entry, returning it if it existed.
    pub fn remove(&mut self, id: EntryId) -> Option<TxMemPoolEntry> {
        let entry = self.entries.remove(id.0)?;
        self.by_txid.remove(&entry.txid());
        Some(entry)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemPoolArena {
    fn default() -> Self {
        Self::new()
    }
}
