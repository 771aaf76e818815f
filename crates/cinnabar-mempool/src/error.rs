use bitcoin::Txid;
use cinnabar_primitives::FeeFrac;

/// Why a set of direct conflicts falls outside the topology the feerate
/// diagram algorithm can evaluate.
///
/// The rendered messages are part of the external interface; callers and
/// tests match on them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("{txid} has {count} ancestors, max 1 allowed")]
    TooManyAncestors { txid: Txid, count: u64 },

    #[error("{txid} has {count} descendants, max 1 allowed")]
    TooManyDescendants { txid: Txid, count: u64 },

    #[error("{txid} has both ancestor and descendant, exceeding cluster limit of 2")]
    AncestorAndDescendant { txid: Txid },

    #[error("{txid} is not the only parent of child {child}")]
    NotOnlyParent { txid: Txid, child: Txid },

    #[error("{txid} is not the only child of parent {parent}")]
    NotOnlyChild { txid: Txid, parent: Txid },
}

/// A replacement rejected by one of the fee or conflict-shape rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RbfError {
    /// The replacement spends an output of a transaction it would evict.
    #[error("{txid} spends conflicting transaction {conflict}")]
    SpendsConflictingTx { txid: Txid, conflict: Txid },

    /// The replacement spends an unconfirmed output outside the conflict set.
    #[error("replacement {txid} adds unconfirmed input, idx {index}")]
    NewUnconfirmedInput { txid: Txid, index: usize },

    /// The conflict closure is too large to consider.
    #[error("rejecting replacement {txid}; too many potential replacements ({count} > {limit})")]
    TooManyReplacements { txid: Txid, count: usize, limit: usize },

    /// The replacement feerate does not beat every conflict's own feerate.
    #[error("rejecting replacement {txid}; new feerate {new_feerate} <= old feerate {old_feerate}")]
    NotBetterFeerate {
        txid: Txid,
        new_feerate: FeeFrac,
        old_feerate: FeeFrac,
    },

    /// The replacement pays less absolute fee than what it evicts.
    #[error("rejecting replacement {txid}, less fees than conflicting txs; {replacement_fees} < {original_fees}")]
    LessFeesThanConflicts {
        txid: Txid,
        replacement_fees: i64,
        original_fees: i64,
    },

    /// The fee increment does not cover relaying the replacement's bytes.
    #[error("rejecting replacement {txid}, not enough additional fees to relay; {additional_fees} < {required_fee}")]
    InsufficientIncrementalFee {
        txid: Txid,
        additional_fees: i64,
        required_fee: i64,
    },
}

/// Outcome of the feerate diagram admission check when it does not pass.
///
/// `Uncalculable` is an expressivity limit (the conflict shape cannot be
/// evaluated; reshaping the transaction may help), while `NotImproved` is a
/// policy verdict (pay more). Callers surface the two differently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagramCheckError {
    #[error("{0}")]
    Uncalculable(TopologyError),

    #[error("insufficient feerate: does not improve feerate diagram")]
    NotImproved,
}

/// Errors produced while validating or applying a replacement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MempoolError {
    #[error("transaction {0} is already in the mempool")]
    AlreadyInMempool(Txid),

    #[error("transaction {0} has no mempool conflicts to replace")]
    NoConflictToReplace(Txid),

    #[error("conflicting transaction {0} does not signal replaceability")]
    NotReplaceable(Txid),

    #[error(transparent)]
    Rbf(#[from] RbfError),

    #[error(transparent)]
    Diagram(#[from] DiagramCheckError),
}
