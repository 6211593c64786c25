//! In-memory versioned backing store for testing.
//!
//! `MemStore` implements `BackingStore` with per-row version chains: every
//! commit appends a version tagged with its block number, and a read at
//! block `n` sees the latest version committed at or before `n`. Tables
//! and keys are kept in `BTreeMap`s so reads are deterministic.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use statetable_primitives::BlockNumber;

use crate::condition::{Condition, ConditionFilter, EntryFilter};
use crate::entry::{Entries, Entry, EntryData, EntryRef, EntryStatus};
use crate::error::StoreError;
use crate::store::{BackingStore, Snapshot, TableData};

#[derive(Debug, Clone)]
struct RowVersion {
    block_number: BlockNumber,
    status: EntryStatus,
    fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredRow {
    id: u64,
    /// Ascending by block number.
    versions: Vec<RowVersion>,
}

impl StoredRow {
    fn visible_at(&self, block_number: BlockNumber) -> Option<&RowVersion> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.block_number <= block_number)
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// table → key → rows in insertion order.
    tables: BTreeMap<String, BTreeMap<String, Vec<StoredRow>>>,
    next_id: u64,
}

/// In-memory versioned store.
#[derive(Debug, Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
    fail_reads: AtomicBool,
    reads: AtomicUsize,
}

impl MemStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table so reads of it answer `Some` even before any row exists.
    pub fn create_table(&self, table: &str) {
        self.inner.write().tables.entry(table.to_string()).or_default();
    }

    /// Store a new row visible from `block_number` on. Returns its identity.
    pub fn insert_row<I, K, V>(
        &self,
        block_number: BlockNumber,
        table: &str,
        key: &str,
        fields: I,
    ) -> u64
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let mut inner = self.inner.write();
        Self::push_new_row(&mut inner, block_number, table, key, EntryStatus::Active, fields)
    }

    /// Apply a table dump as of `snapshot.block_number`.
    ///
    /// Dirty committed rows get a new version; new rows get fresh
    /// identities. Returns the number of rows written.
    pub fn commit(&self, snapshot: &Snapshot, data: &TableData) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        let mut written = 0;

        for (key, rows) in &data.dirty {
            for row in rows {
                let stored = inner
                    .tables
                    .get_mut(&data.table)
                    .ok_or_else(|| StoreError::UnknownTable(data.table.clone()))?
                    .get_mut(key)
                    .and_then(|rows| rows.iter_mut().find(|r| r.id == row.id))
                    .ok_or_else(|| StoreError::UnknownRow {
                        table: data.table.clone(),
                        id: row.id,
                    })?;
                stored.versions.push(RowVersion {
                    block_number: snapshot.block_number,
                    status: row.status,
                    fields: row.fields.clone(),
                });
                written += 1;
            }
        }

        for (key, rows) in &data.new_rows {
            for row in rows {
                Self::push_new_row(
                    &mut inner,
                    snapshot.block_number,
                    &data.table,
                    key,
                    row.status,
                    row.fields.clone(),
                );
                written += 1;
            }
        }

        Ok(written)
    }

    /// Make every subsequent read fail with `StoreError::Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of `select` calls answered so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn push_new_row(
        inner: &mut Inner,
        block_number: BlockNumber,
        table: &str,
        key: &str,
        status: EntryStatus,
        fields: BTreeMap<String, String>,
    ) -> u64 {
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .push(StoredRow {
                id,
                versions: vec![RowVersion {
                    block_number,
                    status,
                    fields,
                }],
            });
        id
    }
}

impl BackingStore for MemStore {
    fn select(
        &self,
        snapshot: &Snapshot,
        table: &str,
        key: &str,
        condition: &Condition,
    ) -> Result<Option<Entries>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("reads disabled for {table}")));
        }

        let inner = self.inner.read();
        let Some(keys) = inner.tables.get(table) else {
            return Ok(None);
        };

        let visible: Vec<EntryRef> = keys
            .get(key)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| {
                        row.visible_at(snapshot.block_number).map(|v| {
                            Entry::from_data(EntryData {
                                id: row.id,
                                status: v.status,
                                dirty: false,
                                fields: v.fields.clone(),
                            })
                            .into_ref()
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let indices = ConditionFilter.matching(&visible, condition);
        Ok(Some(
            indices.into_iter().map(|i| visible[i].clone()).collect(),
        ))
    }
}
