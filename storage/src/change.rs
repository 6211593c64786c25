//! Undo-log records and sinks.
//!
//! Every successful mutating call on a table produces exactly one
//! [`Change`], delivered synchronously to the table's [`ChangeLog`]. The
//! records inside a change carry enough prior state to undo the call with
//! [`MemoryTable::rollback`](crate::memory_table::MemoryTable::rollback).

use parking_lot::Mutex;

use crate::entry::EntryStatus;

/// Kind of mutating call a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Remove,
}

/// Where a touched row lives inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowPosition {
    /// A committed row, addressed by its backing-store identity.
    Committed(u64),
    /// Index into the table's new-row buffer.
    Pending(usize),
    /// Index into the row group of the change's key.
    Grouped(usize),
}

/// Prior state captured for one touched row (or row field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    /// A row was appended. `marker` is the collection length after the
    /// append; undoing truncates back to `marker - 1`.
    Inserted { marker: RowPosition },
    /// A field was overwritten. `previous` is `None` when the field did
    /// not exist before.
    Field {
        position: RowPosition,
        field: String,
        previous: Option<String>,
        was_dirty: bool,
    },
    /// A row's status was changed.
    Status {
        position: RowPosition,
        previous: EntryStatus,
        was_dirty: bool,
    },
}

impl ChangeRecord {
    pub fn position(&self) -> RowPosition {
        match self {
            Self::Inserted { marker } => *marker,
            Self::Field { position, .. } | Self::Status { position, .. } => *position,
        }
    }
}

/// One undo-log entry: everything a single mutating call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Name of the table the change was applied to.
    pub table: String,
    pub kind: ChangeKind,
    pub key: String,
    pub records: Vec<ChangeRecord>,
}

/// Receives a [`Change`] for every successful mutation.
pub trait ChangeLog: Send + Sync {
    fn record(&self, change: Change);
}

/// Sink that discards changes, for tables nobody will roll back.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChangeLog;

impl ChangeLog for NoopChangeLog {
    fn record(&self, _change: Change) {}
}

/// In-memory sink keeping changes in the order they were applied.
#[derive(Debug, Default)]
pub struct ChangeRecorder {
    changes: Mutex<Vec<Change>>,
}

impl ChangeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.lock().is_empty()
    }

    /// Clone of the recorded changes, oldest first.
    pub fn changes(&self) -> Vec<Change> {
        self.changes.lock().clone()
    }

    /// Take every recorded change, oldest first, leaving the recorder empty.
    pub fn take(&self) -> Vec<Change> {
        std::mem::take(&mut *self.changes.lock())
    }
}

impl ChangeLog for ChangeRecorder {
    fn record(&self, change: Change) {
        self.changes.lock().push(change);
    }
}
