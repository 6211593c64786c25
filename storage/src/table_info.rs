//! Table metadata.

use statetable_primitives::Address;

/// Name, schema, and write permissions of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    /// Field that holds the row key. Inserted rows get it set to their key.
    pub key_field: String,
    /// Declared value fields.
    pub fields: Vec<String>,
    /// Addresses allowed to mutate the table. Empty means unrestricted.
    pub authorized: Vec<Address>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            fields: Vec::new(),
            authorized: Vec::new(),
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_authorized(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.authorized.extend(addresses);
        self
    }

    /// Whether `name` is the key field or a declared field.
    pub fn has_field(&self, name: &str) -> bool {
        name == self.key_field || self.fields.iter().any(|f| f == name)
    }
}
