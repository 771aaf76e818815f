//! # Replace-By-Fee admission engine
//!
//! 1. Conflict discovery.
//!     - An incoming transaction conflicts with a pool entry when both spend
//!       the same output; the eviction set is the conflicts plus all of their
//!       in-pool descendants.
//! 2. Replacement policy.
//!     - A replacement must beat every conflict's own feerate, pay at least
//!       the evicted fees plus relay cost for its own bytes, and must not
//!       pull in new unconfirmed ancestors.
//! 3. Feerate diagrams.
//!     - For conflict topologies of at most parent-and-child clusters, the
//!       before/after feerate diagrams are compared to prove the replacement
//!       is a strict improvement for block builders.
//!
//! All checks run against a consistent snapshot of the pool and mutate
//! nothing; applying an accepted replacement is a separate, explicit step.

mod arena;
mod error;
mod options;
mod policy;
mod pool;
#[cfg(test)]
mod tests;

pub use self::arena::{EntryId, MemPoolArena, TxMemPoolEntry};
pub use self::error::{DiagramCheckError, MempoolError, RbfError, TopologyError};
pub use self::options::MemPoolOptions;
pub use self::policy::{
    check_replacement, entries_and_txids_disjoint, get_entries_for_conflicts,
    has_no_new_unconfirmed, improves_feerate_diagram, pays_for_rbf, pays_more_than_conflicts,
    ConflictSet, MAX_CLUSTER_COUNT_REPLACEABLE, MAX_REPLACEMENT_CANDIDATES,
};
pub use self::pool::{EntrySet, MemPool};
