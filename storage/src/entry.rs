//! Table rows (`Entry`) and ordered row collections (`Entries`).
//!
//! An `Entry` is shared, not copied: the overlay table's cache and every
//! result set handed to a caller hold the same `Arc<Entry>`, so a field
//! written through one holder is visible through all of them. Each entry
//! carries its own lock so concurrent writers to the same row serialize
//! on that row only.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Name under which a row's backing-store identity is exposed.
pub const ID_FIELD: &str = "_id_";

/// Name under which a row's lifecycle status is exposed.
pub const STATUS_FIELD: &str = "_status_";

/// Returns true for administrative field names of the form `_name_`.
pub fn is_system_field(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('_') && name.ends_with('_')
}

/// Lifecycle status of a row. Removed rows are kept in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryStatus {
    #[default]
    Active,
    Removed,
}

impl EntryStatus {
    /// Numeric form used when a status is rendered as a field value.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Removed => 1,
        }
    }
}

/// Plain-value contents of an [`Entry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryData {
    /// Identity assigned by the backing store; `0` means never committed.
    pub id: u64,
    pub status: EntryStatus,
    /// Set whenever the row is modified after being loaded.
    pub dirty: bool,
    /// Field values keyed by field name. `BTreeMap` keeps iteration
    /// order deterministic for hashing and dumps.
    pub fields: BTreeMap<String, String>,
}

impl EntryData {
    /// Look up a field, answering the system fields [`ID_FIELD`] and
    /// [`STATUS_FIELD`] from the row's identity and status.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            ID_FIELD => Some(Cow::Owned(self.id.to_string())),
            STATUS_FIELD => Some(Cow::Owned(self.status.as_u8().to_string())),
            _ => self.fields.get(name).map(|v| Cow::Borrowed(v.as_str())),
        }
    }
}

/// A single row: field values plus identity and lifecycle flags.
#[derive(Debug, Default)]
pub struct Entry {
    inner: RwLock<EntryData>,
}

/// Shared handle to an [`Entry`].
pub type EntryRef = Arc<Entry>;

impl Entry {
    /// Create an empty, uncommitted row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an uncommitted row holding the given fields.
    ///
    /// The row starts dirty: it carries data the backing store has never seen.
    pub fn with_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_data(EntryData {
            dirty: true,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..EntryData::default()
        })
    }

    /// Create a clean row as loaded from the backing store.
    pub fn committed(id: u64, status: EntryStatus, fields: BTreeMap<String, String>) -> Self {
        Self::from_data(EntryData {
            id,
            status,
            dirty: false,
            fields,
        })
    }

    /// Wrap existing row contents.
    pub fn from_data(data: EntryData) -> Self {
        Self {
            inner: RwLock::new(data),
        }
    }

    /// Move this row behind a shared handle.
    pub fn into_ref(self) -> EntryRef {
        Arc::new(self)
    }

    pub fn id(&self) -> u64 {
        self.inner.read().id
    }

    pub fn set_id(&self, id: u64) {
        self.inner.write().id = id;
    }

    pub fn status(&self) -> EntryStatus {
        self.inner.read().status
    }

    pub fn is_removed(&self) -> bool {
        self.status() == EntryStatus::Removed
    }

    /// Change the row's status and mark it dirty.
    pub fn set_status(&self, status: EntryStatus) {
        let mut inner = self.inner.write();
        inner.status = status;
        inner.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.inner.write().dirty = dirty;
    }

    /// Read a field value.
    ///
    /// The system fields [`ID_FIELD`] and [`STATUS_FIELD`] are answered
    /// from the row's identity and status.
    pub fn get_field(&self, name: &str) -> Option<String> {
        self.inner.read().field(name).map(Cow::into_owned)
    }

    /// Overwrite a field, mark the row dirty, and return the previous value.
    pub fn set_field(&self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let mut inner = self.inner.write();
        inner.dirty = true;
        inner.fields.insert(name.into(), value.into())
    }

    /// Clone of all user fields.
    pub fn fields(&self) -> BTreeMap<String, String> {
        self.inner.read().fields.clone()
    }

    /// Clone of the full row contents.
    pub fn snapshot(&self) -> EntryData {
        self.inner.read().clone()
    }

    /// Run `f` under this row's shared lock.
    pub fn with_data<R>(&self, f: impl FnOnce(&EntryData) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run `f` under this row's exclusive lock.
    ///
    /// Used when a read-modify-write on the row must not interleave with
    /// another writer holding the same shared row.
    pub fn modify<R>(&self, f: impl FnOnce(&mut EntryData) -> R) -> R {
        f(&mut self.inner.write())
    }
}

/// An ordered collection of rows with an aggregate change flag.
#[derive(Debug, Clone, Default)]
pub struct Entries {
    entries: Vec<EntryRef>,
    dirty: bool,
}

impl Entries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EntryRef> {
        self.entries.get(index)
    }

    /// Append a row and mark the collection dirty.
    pub fn add_entry(&mut self, entry: EntryRef) {
        self.entries.push(entry);
        self.dirty = true;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntryRef> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[EntryRef] {
        &self.entries
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Drop every row at or after `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Value copies of every row, in order.
    pub fn snapshot(&self) -> Vec<EntryData> {
        self.entries.iter().map(|e| e.snapshot()).collect()
    }
}

/// Collecting rows does not mark the collection dirty; only
/// [`Entries::add_entry`] and explicit [`Entries::set_dirty`] do.
impl FromIterator<EntryRef> for Entries {
    fn from_iter<I: IntoIterator<Item = EntryRef>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            dirty: false,
        }
    }
}

impl<'a> IntoIterator for &'a Entries {
    type Item = &'a EntryRef;
    type IntoIter = std::slice::Iter<'a, EntryRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_uncommitted() {
        let entry = Entry::new();
        assert_eq!(entry.id(), 0);
        assert_eq!(entry.status(), EntryStatus::Active);
        assert!(!entry.is_dirty());
        assert!(entry.fields().is_empty());
    }

    #[test]
    fn test_with_fields_starts_dirty() {
        let entry = Entry::with_fields([("balance", "100")]);
        assert!(entry.is_dirty());
        assert_eq!(entry.get_field("balance"), Some("100".to_string()));
    }

    #[test]
    fn test_set_field_returns_previous_and_marks_dirty() {
        let mut fields = BTreeMap::new();
        fields.insert("balance".to_string(), "100".to_string());
        let entry = Entry::committed(7, EntryStatus::Active, fields);
        assert!(!entry.is_dirty());

        assert_eq!(entry.set_field("balance", "150"), Some("100".to_string()));
        assert_eq!(entry.set_field("memo", "hi"), None);
        assert!(entry.is_dirty());
        assert_eq!(entry.get_field("balance"), Some("150".to_string()));
    }

    #[test]
    fn test_system_fields_reflect_identity_and_status() {
        let entry = Entry::committed(42, EntryStatus::Active, BTreeMap::new());
        assert_eq!(entry.get_field(ID_FIELD), Some("42".to_string()));
        assert_eq!(entry.get_field(STATUS_FIELD), Some("0".to_string()));

        entry.set_status(EntryStatus::Removed);
        assert_eq!(entry.get_field(STATUS_FIELD), Some("1".to_string()));
        assert!(entry.is_removed());
        assert!(entry.is_dirty());
    }

    #[test]
    fn test_shared_entry_aliasing() {
        let entry = Entry::with_fields([("balance", "1")]).into_ref();
        let alias = Arc::clone(&entry);
        alias.set_field("balance", "2");
        assert_eq!(entry.get_field("balance"), Some("2".to_string()));
    }

    #[test]
    fn test_is_system_field() {
        assert!(is_system_field(ID_FIELD));
        assert!(is_system_field(STATUS_FIELD));
        assert!(is_system_field("_hash_"));
        assert!(!is_system_field("_"));
        assert!(!is_system_field("_balance"));
        assert!(!is_system_field("balance_"));
        assert!(!is_system_field("balance"));
    }

    #[test]
    fn test_entries_add_marks_dirty_collect_does_not() {
        let collected: Entries = vec![Entry::new().into_ref()].into_iter().collect();
        assert_eq!(collected.len(), 1);
        assert!(!collected.dirty());

        let mut entries = Entries::new();
        assert!(entries.is_empty());
        entries.add_entry(Entry::new().into_ref());
        assert!(entries.dirty());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_entries_truncate_and_snapshot() {
        let mut entries = Entries::new();
        entries.add_entry(Entry::with_fields([("n", "1")]).into_ref());
        entries.add_entry(Entry::with_fields([("n", "2")]).into_ref());
        entries.truncate(1);

        let snap = entries.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].fields.get("n"), Some(&"1".to_string()));
    }
}
