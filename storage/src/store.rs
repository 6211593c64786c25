//! Backing store abstraction for overlay tables.
//!
//! A `BackingStore` answers point-in-time queries: the rows of a table key
//! as committed at a given block. Overlay tables layer their uncommitted
//! state on top of these answers.
//!
//! Implementations:
//! - `MemStore` (this crate): in-memory versioned store for testing
//! - persistent stores live outside this crate

use std::collections::BTreeMap;

use statetable_primitives::{BlockNumber, Hash, ZERO_HASH};

use crate::condition::Condition;
use crate::entry::{Entries, EntryData};
use crate::error::StoreError;

/// Block coordinates every read of a table is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Snapshot {
    pub block_hash: Hash,
    pub block_number: BlockNumber,
}

impl Snapshot {
    pub fn new(block_hash: Hash, block_number: BlockNumber) -> Self {
        Self {
            block_hash,
            block_number,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(ZERO_HASH, 0)
    }
}

/// Abstraction over versioned committed state.
///
/// Implementations must be deterministic: the same query at the same
/// snapshot always returns the same rows, in the same order.
pub trait BackingStore: Send + Sync {
    /// Rows stored under `key` in `table` as of `snapshot` that satisfy
    /// `condition`.
    ///
    /// Returns `Ok(None)` when the store has nothing to say about the
    /// table, which is distinct from `Ok(Some(empty))`. Every returned row
    /// is a fresh object with a non-zero identity and a clear dirty flag.
    fn select(
        &self,
        snapshot: &Snapshot,
        table: &str,
        key: &str,
        condition: &Condition,
    ) -> Result<Option<Entries>, StoreError>;
}

/// Rows a table changed, grouped by key, ready to be committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableData {
    pub table: String,
    /// Committed rows (non-zero identity) modified in place.
    pub dirty: BTreeMap<String, Vec<EntryData>>,
    /// Rows inserted by the table, without identity yet.
    pub new_rows: BTreeMap<String, Vec<EntryData>>,
}

impl TableData {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.values().all(Vec::is_empty) && self.new_rows.values().all(Vec::is_empty)
    }
}
