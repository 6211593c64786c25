//! `statetable-storage`: snapshot-scoped overlay tables for the state layer.
//!
//! A running transaction reads committed state through a [`MemoryTable`]
//! bound to one block snapshot, accumulates uncommitted updates, inserts,
//! and soft-deletes in memory, and can produce a deterministic commitment
//! over exactly the rows it changed. This crate provides:
//!
//! - `Entry` / `Entries`: shared rows and ordered row collections
//! - `Condition` / `EntryFilter`: row predicates and their evaluation
//! - `BackingStore`: versioned committed-state abstraction, with `MemStore`
//! - `ChangeLog`: undo-log sink receiving one `Change` per mutation
//! - `FieldValidator`, `Authorizer`, `HashFieldClassifier`: table policies
//! - `TableConfig`: cache layout, digest, and field limits
//! - `MemoryTable`: the overlay itself

pub mod access;
pub mod change;
pub mod condition;
pub mod config;
pub mod entry;
pub mod error;
pub mod mem_store;
pub mod memory_table;
pub mod policy;
pub mod store;
pub mod table_info;

// Re-export commonly used types at the crate root.
pub use access::AccessOptions;
pub use change::{
    Change, ChangeKind, ChangeLog, ChangeRecord, ChangeRecorder, NoopChangeLog, RowPosition,
};
pub use condition::{Condition, ConditionFilter, EntryFilter};
pub use config::{CacheMode, TableConfig};
pub use entry::{Entries, Entry, EntryData, EntryRef, EntryStatus};
pub use error::{StoreError, TableError};
pub use mem_store::MemStore;
pub use memory_table::{MemoryTable, MutationResult};
pub use policy::{
    Authorizer, FieldValidator, HashFieldClassifier, SchemaValidator, SystemFieldClassifier,
    TableAuthorizer,
};
pub use store::{BackingStore, Snapshot, TableData};
pub use table_info::TableInfo;
