//! Overlay table: a transaction's view of one table at one snapshot.
//!
//! A `MemoryTable` merges three sources on every read: rows the backing
//! store reports at the table's snapshot, rows this table has already
//! mutated (which shadow their committed copies), and rows inserted by
//! this table that have no identity yet. Writes mutate shared row objects
//! in place and report one [`Change`] per call to the table's undo log.
//!
//! Two cache layouts are supported (see [`CacheMode`]):
//!
//! - **By identity** (backing store attached): mutated committed rows are
//!   kept in an identity-keyed cache, inserted rows in a separate buffer.
//! - **By key**: rows are kept in per-key groups. With a store attached, a
//!   group is seeded from the store the first time its key is touched;
//!   without one the table is a pure in-memory buffer.
//!
//! ## Locking
//!
//! The cache, new-row buffer, and key groups sit behind one `RwLock`.
//! Reads hold it shared, structural writes hold it exclusively, and no
//! backing-store query runs while it is held. Field writes go through the
//! per-row lock of the shared [`Entry`].

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use statetable_primitives::types::to_hex;
use statetable_primitives::{Hash, StatusCode, ZERO_HASH};
use tracing::{debug, error, trace, warn};

use crate::access::AccessOptions;
use crate::change::{Change, ChangeKind, ChangeLog, ChangeRecord, NoopChangeLog, RowPosition};
use crate::condition::{Condition, ConditionFilter, EntryFilter};
use crate::config::{CacheMode, TableConfig};
use crate::entry::{Entries, Entry, EntryRef, EntryStatus};
use crate::error::TableError;
use crate::policy::{
    Authorizer, FieldValidator, HashFieldClassifier, SchemaValidator, SystemFieldClassifier,
    TableAuthorizer,
};
use crate::store::{BackingStore, Snapshot, TableData};
use crate::table_info::TableInfo;

/// Outcome of a legacy-contract mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationResult {
    /// Number of rows affected. Zero also covers validation and store
    /// faults, which are logged.
    Rows(usize),
    /// The acting identity may not mutate this table. Nothing changed.
    NotAuthorized,
}

impl MutationResult {
    /// Row count, or `None` on authorization denial.
    pub fn rows(self) -> Option<usize> {
        match self {
            Self::Rows(n) => Some(n),
            Self::NotAuthorized => None,
        }
    }

    /// Numeric form: the row count, or the not-authorized status code.
    pub fn as_code(self) -> i32 {
        match self {
            Self::Rows(n) => i32::try_from(n).unwrap_or(i32::MAX),
            Self::NotAuthorized => StatusCode::NotAuthorized.as_i32(),
        }
    }
}

/// Where this table keeps touched rows, with the store it reads through.
enum Backing {
    Identity(Arc<dyn BackingStore>),
    Grouped(Option<Arc<dyn BackingStore>>),
}

/// A row together with the key it belongs to.
struct KeyedEntry {
    key: String,
    entry: EntryRef,
}

#[derive(Default)]
struct TableState {
    /// Identity → mutated committed row. Identity 0 never appears here.
    entry_cache: BTreeMap<u64, KeyedEntry>,
    /// Inserted rows, in insertion order.
    new_rows: Vec<KeyedEntry>,
    /// Key → rows, used in key-grouped mode.
    groups: BTreeMap<String, Entries>,
}

/// A row resolved by a read, with the position undo records refer to.
struct Located {
    position: RowPosition,
    entry: EntryRef,
}

/// Transactional overlay over one table at one snapshot.
pub struct MemoryTable {
    info: Arc<TableInfo>,
    snapshot: Snapshot,
    config: TableConfig,
    backing: Backing,
    filter: Arc<dyn EntryFilter>,
    validator: Arc<dyn FieldValidator>,
    authorizer: Arc<dyn Authorizer>,
    classifier: Arc<dyn HashFieldClassifier>,
    change_log: Arc<dyn ChangeLog>,
    state: RwLock<TableState>,
}

impl MemoryTable {
    /// Create a table reading through `store` at `snapshot`.
    ///
    /// Passing no store makes the table a pure in-memory buffer.
    pub fn new(
        info: TableInfo,
        snapshot: Snapshot,
        store: Option<Arc<dyn BackingStore>>,
        config: TableConfig,
    ) -> Self {
        let backing = match (config.cache_mode, store) {
            (CacheMode::Auto | CacheMode::ByIdentity, Some(store)) => Backing::Identity(store),
            (CacheMode::ByKey, store) => Backing::Grouped(store),
            (CacheMode::ByIdentity, None) => {
                debug!(
                    table = %info.name,
                    "identity cache requested without a store, grouping by key"
                );
                Backing::Grouped(None)
            }
            (CacheMode::Auto, None) => Backing::Grouped(None),
        };
        let info = Arc::new(info);
        Self {
            validator: Arc::new(SchemaValidator::new(Arc::clone(&info), &config)),
            info,
            snapshot,
            config,
            backing,
            filter: Arc::new(ConditionFilter),
            authorizer: Arc::new(TableAuthorizer),
            classifier: Arc::new(SystemFieldClassifier),
            change_log: Arc::new(NoopChangeLog),
            state: RwLock::new(TableState::default()),
        }
    }

    /// Create a table with no backing store.
    pub fn unbacked(info: TableInfo, config: TableConfig) -> Self {
        Self::new(info, Snapshot::default(), None, config)
    }

    pub fn with_change_log(mut self, change_log: Arc<dyn ChangeLog>) -> Self {
        self.change_log = change_log;
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn FieldValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn EntryFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_hash_classifier(mut self, classifier: Arc<dyn HashFieldClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Whether reads go through a backing store.
    pub fn is_backed(&self) -> bool {
        match &self.backing {
            Backing::Identity(_) => true,
            Backing::Grouped(store) => store.is_some(),
        }
    }

    /// The cache layout in effect (never `Auto`).
    pub fn cache_mode(&self) -> CacheMode {
        match self.backing {
            Backing::Identity(_) => CacheMode::ByIdentity,
            Backing::Grouped(_) => CacheMode::ByKey,
        }
    }

    // ── Reads ──

    /// Logically current rows under `key` that satisfy `condition`.
    ///
    /// Never fails: a fault is logged and yields an empty result, which
    /// callers cannot tell apart from "no matching rows". Use
    /// [`try_select`](Self::try_select) to see the fault.
    pub fn select(&self, key: &str, condition: &Condition) -> Entries {
        match self.try_select(key, condition) {
            Ok(entries) => entries,
            Err(err) => {
                error!(table = %self.info.name, key, error = %err, "table select failed");
                Entries::new()
            }
        }
    }

    /// Fallible form of [`select`](Self::select).
    ///
    /// With an identity cache, committed rows come first in store order,
    /// each replaced by its cached object when this table has mutated it.
    /// The replacement is not re-checked against `condition`: a row that
    /// matched as committed is returned with its local values even if
    /// they no longer match. Rows removed locally are left out. Inserted
    /// rows under `key` follow, filtered live, in insertion order. A
    /// [`limit`](Condition::limit) window is applied once, to that merged
    /// list.
    pub fn try_select(&self, key: &str, condition: &Condition) -> Result<Entries, TableError> {
        Ok(self
            .locate(key, condition, true)?
            .into_iter()
            .map(|row| row.entry)
            .collect())
    }

    fn locate(
        &self,
        key: &str,
        condition: &Condition,
        populate: bool,
    ) -> Result<Vec<Located>, TableError> {
        match &self.backing {
            Backing::Identity(store) => self.locate_by_identity(store.as_ref(), key, condition),
            Backing::Grouped(store) => {
                self.ensure_group(store.as_deref(), key, populate)?;
                Ok(self.locate_in_group(key, condition))
            }
        }
    }

    fn locate_by_identity(
        &self,
        store: &dyn BackingStore,
        key: &str,
        condition: &Condition,
    ) -> Result<Vec<Located>, TableError> {
        // The window applies to the merged view, not to either source.
        let unwindowed = condition.without_window();
        let Some(committed) = store.select(&self.snapshot, &self.info.name, key, &unwindowed)?
        else {
            return Ok(Vec::new());
        };

        let state = self.state.read();
        let mut rows = Vec::with_capacity(committed.len());
        for entry in committed.iter() {
            let id = entry.id();
            if id == 0 {
                error!(
                    table = %self.info.name,
                    key,
                    "backing store returned a row without identity"
                );
                continue;
            }
            let entry = match state.entry_cache.get(&id) {
                Some(cached) => {
                    if cached.entry.is_removed() && !condition.includes_removed() {
                        continue;
                    }
                    Arc::clone(&cached.entry)
                }
                None => Arc::clone(entry),
            };
            rows.push(Located {
                position: RowPosition::Committed(id),
                entry,
            });
        }

        let pending: Vec<(usize, EntryRef)> = state
            .new_rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.key == key)
            .map(|(index, row)| (index, Arc::clone(&row.entry)))
            .collect();
        let candidates: Vec<EntryRef> = pending.iter().map(|(_, e)| Arc::clone(e)).collect();
        for i in self.filter.matching(&candidates, &unwindowed) {
            if let Some((index, entry)) = pending.get(i) {
                rows.push(Located {
                    position: RowPosition::Pending(*index),
                    entry: Arc::clone(entry),
                });
            }
        }
        Ok(condition.window(rows))
    }

    fn locate_in_group(&self, key: &str, condition: &Condition) -> Vec<Located> {
        let state = self.state.read();
        let Some(group) = state.groups.get(key) else {
            return Vec::new();
        };
        self.filter
            .matching(group.as_slice(), condition)
            .into_iter()
            .filter_map(|i| {
                group.get(i).map(|entry| Located {
                    position: RowPosition::Grouped(i),
                    entry: Arc::clone(entry),
                })
            })
            .collect()
    }

    /// Make sure `key` has a row group, seeding it from the store when
    /// `populate` is set. Removed rows are loaded too.
    fn ensure_group(
        &self,
        store: Option<&dyn BackingStore>,
        key: &str,
        populate: bool,
    ) -> Result<(), TableError> {
        if self.state.read().groups.contains_key(key) {
            return Ok(());
        }
        let mut seeded = match (store, populate) {
            (Some(store), true) => store
                .select(
                    &self.snapshot,
                    &self.info.name,
                    key,
                    &Condition::new().include_removed(),
                )?
                .unwrap_or_default(),
            _ => Entries::new(),
        };
        seeded.set_dirty(false);
        // Another caller may have seeded the group while the store was queried.
        self.state
            .write()
            .groups
            .entry(key.to_string())
            .or_insert(seeded);
        Ok(())
    }

    // ── Writes ──

    /// Overwrite the fields present in `patch` on every row matched by
    /// `condition`. Returns the number of rows matched.
    pub fn update(
        &self,
        key: &str,
        patch: &Entry,
        condition: &Condition,
        options: &AccessOptions,
    ) -> MutationResult {
        self.settle("update", key, self.try_update(key, patch, condition, options))
    }

    /// Fallible form of [`update`](Self::update).
    pub fn try_update(
        &self,
        key: &str,
        patch: &Entry,
        condition: &Condition,
        options: &AccessOptions,
    ) -> Result<usize, TableError> {
        self.check_authority("update", key, options)?;
        let patch = patch.snapshot();
        self.validator.check_key(key)?;
        self.validator.check_entry(&patch)?;

        let targets = self.adopt(key, self.locate(key, condition, true)?);

        let mut records = Vec::new();
        for row in &targets {
            row.entry.modify(|data| {
                let was_dirty = data.dirty;
                for (field, value) in &patch.fields {
                    let previous = data.fields.insert(field.clone(), value.clone());
                    records.push(ChangeRecord::Field {
                        position: row.position,
                        field: field.clone(),
                        previous,
                        was_dirty,
                    });
                }
                if !patch.fields.is_empty() {
                    data.dirty = true;
                }
            });
        }

        if !targets.is_empty() {
            self.mark_group_dirty(key);
        }
        self.emit(ChangeKind::Update, key, records);
        trace!(table = %self.info.name, key, rows = targets.len(), "update applied");
        Ok(targets.len())
    }

    /// Buffer a new row under `key`. Returns 1.
    ///
    /// No duplicate check is made. `populate_from_store` only matters in
    /// key-grouped mode with a store attached: it decides whether the
    /// key's group is seeded from the store before the row is appended.
    pub fn insert(
        &self,
        key: &str,
        entry: Entry,
        options: &AccessOptions,
        populate_from_store: bool,
    ) -> MutationResult {
        self.settle(
            "insert",
            key,
            self.try_insert(key, entry, options, populate_from_store),
        )
    }

    /// Fallible form of [`insert`](Self::insert).
    pub fn try_insert(
        &self,
        key: &str,
        entry: Entry,
        options: &AccessOptions,
        populate_from_store: bool,
    ) -> Result<usize, TableError> {
        self.check_authority("insert", key, options)?;
        self.validator.check_key(key)?;
        entry.with_data(|data| self.validator.check_entry(data))?;

        let key_field = self.info.key_field.as_str();
        entry.modify(|data| {
            data.id = 0;
            data.dirty = true;
            if !key_field.is_empty() && !data.fields.contains_key(key_field) {
                data.fields.insert(key_field.to_string(), key.to_string());
            }
        });
        let entry = entry.into_ref();

        let marker = match &self.backing {
            Backing::Identity(_) => {
                let mut state = self.state.write();
                state.new_rows.push(KeyedEntry {
                    key: key.to_string(),
                    entry,
                });
                RowPosition::Pending(state.new_rows.len())
            }
            Backing::Grouped(store) => {
                self.ensure_group(store.as_deref(), key, populate_from_store)?;
                let mut state = self.state.write();
                let group = state.groups.entry(key.to_string()).or_default();
                group.add_entry(entry);
                RowPosition::Grouped(group.len())
            }
        };

        self.emit(ChangeKind::Insert, key, vec![ChangeRecord::Inserted { marker }]);
        trace!(table = %self.info.name, key, "insert applied");
        Ok(1)
    }

    /// Soft-delete every row matched by `condition`. Returns the number
    /// of rows removed.
    pub fn remove(
        &self,
        key: &str,
        condition: &Condition,
        options: &AccessOptions,
    ) -> MutationResult {
        self.settle("remove", key, self.try_remove(key, condition, options))
    }

    /// Fallible form of [`remove`](Self::remove).
    pub fn try_remove(
        &self,
        key: &str,
        condition: &Condition,
        options: &AccessOptions,
    ) -> Result<usize, TableError> {
        self.check_authority("remove", key, options)?;

        let targets = self.adopt(key, self.locate(key, condition, true)?);

        let mut records = Vec::with_capacity(targets.len());
        for row in &targets {
            row.entry.modify(|data| {
                records.push(ChangeRecord::Status {
                    position: row.position,
                    previous: data.status,
                    was_dirty: data.dirty,
                });
                data.status = EntryStatus::Removed;
                data.dirty = true;
            });
        }

        if !targets.is_empty() {
            self.mark_group_dirty(key);
        }
        self.emit(ChangeKind::Remove, key, records);
        trace!(table = %self.info.name, key, rows = targets.len(), "remove applied");
        Ok(targets.len())
    }

    /// Undo one change previously reported by this table.
    ///
    /// Changes must be undone newest first: undoing an insert truncates
    /// the buffer back to the row's position, dropping anything appended
    /// after it.
    pub fn rollback(&self, change: &Change) {
        if change.table != self.info.name {
            warn!(
                table = %self.info.name,
                change_table = %change.table,
                "rollback of a change from another table ignored"
            );
            return;
        }
        for record in change.records.iter().rev() {
            let position = record.position();
            if let ChangeRecord::Inserted { .. } = record {
                self.truncate(&change.key, position);
                continue;
            }
            let Some(entry) = self.resolve(&change.key, position) else {
                continue;
            };
            entry.modify(|data| match record {
                ChangeRecord::Field {
                    field,
                    previous,
                    was_dirty,
                    ..
                } => {
                    match previous {
                        Some(value) => data.fields.insert(field.clone(), value.clone()),
                        None => data.fields.remove(field),
                    };
                    data.dirty = *was_dirty;
                }
                ChangeRecord::Status {
                    previous,
                    was_dirty,
                    ..
                } => {
                    data.status = *previous;
                    data.dirty = *was_dirty;
                }
                ChangeRecord::Inserted { .. } => {}
            });
        }
        trace!(
            table = %self.info.name,
            key = %change.key,
            kind = ?change.kind,
            "change rolled back"
        );
    }

    // ── Commitment ──

    /// Digest committing to exactly the rows this table has changed.
    ///
    /// Keys are visited in sorted order. For each key with at least one
    /// dirty row, the key bytes are appended once, then for each dirty row
    /// the name and value bytes of every hash-relevant field. With an
    /// identity cache a key's rows are its cached rows by ascending
    /// identity followed by its inserted rows in insertion order. Returns
    /// [`ZERO_HASH`] when nothing is dirty.
    ///
    /// The key is appended only once a dirty row is found, not whenever a
    /// key group's aggregate flag is set: a group flagged dirty whose rows
    /// are all clean (an empty-patch update, or a fully rolled-back write)
    /// contributes nothing.
    pub fn hash(&self) -> Hash {
        let state = self.state.read();
        let mut data = Vec::new();

        match &self.backing {
            Backing::Grouped(_) => {
                for (key, group) in &state.groups {
                    if group.dirty() {
                        self.fold_rows(&mut data, key, group.iter());
                    }
                }
            }
            Backing::Identity(_) => {
                for (key, rows) in state.rows_by_key() {
                    self.fold_rows(&mut data, key, rows.into_iter());
                }
            }
        }

        if data.is_empty() {
            return ZERO_HASH;
        }
        self.config.digest.digest(&data)
    }

    fn fold_rows<'a>(
        &self,
        data: &mut Vec<u8>,
        key: &str,
        rows: impl Iterator<Item = &'a EntryRef>,
    ) {
        let mut key_written = false;
        for entry in rows {
            entry.with_data(|row| {
                if !row.dirty {
                    return;
                }
                if !key_written {
                    data.extend_from_slice(key.as_bytes());
                    key_written = true;
                }
                for (name, value) in &row.fields {
                    if self.classifier.is_hash_field(name) {
                        data.extend_from_slice(name.as_bytes());
                        data.extend_from_slice(value.as_bytes());
                    }
                }
            });
        }
    }

    /// Value copies of every changed row, grouped by key, for commit.
    pub fn dump(&self) -> TableData {
        let state = self.state.read();
        let mut dump = TableData::new(self.info.name.clone());

        let rows: Vec<(&str, Vec<&EntryRef>)> = match &self.backing {
            Backing::Grouped(_) => state
                .groups
                .iter()
                .map(|(key, group)| (key.as_str(), group.iter().collect()))
                .collect(),
            Backing::Identity(_) => state.rows_by_key().into_iter().collect(),
        };

        for (key, entries) in rows {
            for entry in entries {
                let row = entry.snapshot();
                let target = if row.id == 0 {
                    &mut dump.new_rows
                } else if row.dirty {
                    &mut dump.dirty
                } else {
                    continue;
                };
                target.entry(key.to_string()).or_default().push(row);
            }
        }
        dump
    }

    // ── Internals ──

    /// Route the committed rows of a write through the identity cache.
    ///
    /// A row already cached is replaced by the cached object; any other
    /// committed row is inserted into the cache before it is mutated, so
    /// concurrent writers to the same identity share one object.
    fn adopt(&self, key: &str, rows: Vec<Located>) -> Vec<Located> {
        if !matches!(self.backing, Backing::Identity(_))
            || !rows
                .iter()
                .any(|r| matches!(r.position, RowPosition::Committed(_)))
        {
            return rows;
        }

        let mut state = self.state.write();
        rows.into_iter()
            .map(|row| match row.position {
                RowPosition::Committed(id) => {
                    debug_assert_ne!(id, 0, "uncommitted row routed to the identity cache");
                    let cached = state.entry_cache.entry(id).or_insert_with(|| KeyedEntry {
                        key: key.to_string(),
                        entry: Arc::clone(&row.entry),
                    });
                    Located {
                        position: row.position,
                        entry: Arc::clone(&cached.entry),
                    }
                }
                _ => row,
            })
            .collect()
    }

    fn resolve(&self, key: &str, position: RowPosition) -> Option<EntryRef> {
        let state = self.state.read();
        let entry = match position {
            RowPosition::Committed(id) => state.entry_cache.get(&id).map(|r| Arc::clone(&r.entry)),
            RowPosition::Pending(index) => state.new_rows.get(index).map(|r| Arc::clone(&r.entry)),
            RowPosition::Grouped(index) => state
                .groups
                .get(key)
                .and_then(|g| g.get(index))
                .map(Arc::clone),
        };
        if entry.is_none() {
            warn!(table = %self.info.name, key, ?position, "rollback target not found");
        }
        entry
    }

    fn truncate(&self, key: &str, marker: RowPosition) {
        let mut state = self.state.write();
        match marker {
            RowPosition::Pending(len) => state.new_rows.truncate(len.saturating_sub(1)),
            RowPosition::Grouped(len) => {
                if let Some(group) = state.groups.get_mut(key) {
                    group.truncate(len.saturating_sub(1));
                }
            }
            RowPosition::Committed(id) => {
                error!(
                    table = %self.info.name,
                    key,
                    id,
                    "insert marker cannot address a committed row"
                );
            }
        }
    }

    fn mark_group_dirty(&self, key: &str) {
        if let Backing::Grouped(_) = self.backing {
            if let Some(group) = self.state.write().groups.get_mut(key) {
                group.set_dirty(true);
            }
        }
    }

    fn check_authority(
        &self,
        op: &'static str,
        key: &str,
        options: &AccessOptions,
    ) -> Result<(), TableError> {
        if options.enforce_authorization
            && !self
                .authorizer
                .is_authorized(&self.info, &options.acting_identity)
        {
            let origin = to_hex(&options.acting_identity);
            warn!(
                table = %self.info.name,
                op,
                origin = %origin,
                key,
                "non-authorized write rejected"
            );
            return Err(TableError::NotAuthorized {
                table: self.info.name.clone(),
                origin,
            });
        }
        Ok(())
    }

    fn emit(&self, kind: ChangeKind, key: &str, records: Vec<ChangeRecord>) {
        self.change_log.record(Change {
            table: self.info.name.clone(),
            kind,
            key: key.to_string(),
            records,
        });
    }

    fn settle(
        &self,
        op: &'static str,
        key: &str,
        result: Result<usize, TableError>,
    ) -> MutationResult {
        match result {
            Ok(rows) => MutationResult::Rows(rows),
            Err(TableError::NotAuthorized { .. }) => MutationResult::NotAuthorized,
            Err(err) => {
                error!(table = %self.info.name, op, key, error = %err, "table access failed");
                MutationResult::Rows(0)
            }
        }
    }
}

impl TableState {
    /// Cached and inserted rows grouped by key: cached rows by ascending
    /// identity, then inserted rows in insertion order.
    fn rows_by_key(&self) -> BTreeMap<&str, Vec<&EntryRef>> {
        let mut rows: BTreeMap<&str, Vec<&EntryRef>> = BTreeMap::new();
        for cached in self.entry_cache.values() {
            rows.entry(cached.key.as_str()).or_default().push(&cached.entry);
        }
        for pending in &self.new_rows {
            rows.entry(pending.key.as_str()).or_default().push(&pending.entry);
        }
        rows
    }
}
