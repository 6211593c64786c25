//! Pluggable table policies: field validation, write authorization, and
//! hash-field classification.
//!
//! Each policy is a trait so a table can be built with alternatives; the
//! defaults here derive their decisions from [`TableInfo`] and
//! [`TableConfig`].

use std::sync::Arc;

use statetable_primitives::Address;

use crate::config::TableConfig;
use crate::entry::{is_system_field, EntryData, ID_FIELD, STATUS_FIELD};
use crate::error::TableError;
use crate::table_info::TableInfo;

/// Rejects keys and field names/values the table schema does not permit.
pub trait FieldValidator: Send + Sync {
    fn check_key(&self, key: &str) -> Result<(), TableError>;

    fn check_entry(&self, entry: &EntryData) -> Result<(), TableError>;
}

/// Decides whether an acting identity may mutate a table.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, table: &TableInfo, origin: &Address) -> bool;
}

/// Decides whether a field participates in the table state commitment.
pub trait HashFieldClassifier: Send + Sync {
    fn is_hash_field(&self, name: &str) -> bool;
}

/// Default [`FieldValidator`]: declared fields only, within configured limits.
///
/// System fields (`_name_`) other than the identity and status fields are
/// accepted without being declared. The identity and status fields are
/// reserved: they are answered from the row itself and cannot be written.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    info: Arc<TableInfo>,
    max_key_len: usize,
    max_field_name_len: usize,
    max_field_value_len: usize,
}

impl SchemaValidator {
    pub fn new(info: Arc<TableInfo>, config: &TableConfig) -> Self {
        Self {
            info,
            max_key_len: config.max_key_len,
            max_field_name_len: config.max_field_name_len,
            max_field_value_len: config.max_field_value_len,
        }
    }
}

impl FieldValidator for SchemaValidator {
    fn check_key(&self, key: &str) -> Result<(), TableError> {
        if key.len() > self.max_key_len {
            return Err(TableError::InvalidKey(format!(
                "key length {} exceeds {}",
                key.len(),
                self.max_key_len
            )));
        }
        Ok(())
    }

    fn check_entry(&self, entry: &EntryData) -> Result<(), TableError> {
        for (name, value) in &entry.fields {
            if name == ID_FIELD || name == STATUS_FIELD {
                return Err(TableError::invalid_field(name, "reserved system field"));
            }
            if name.len() > self.max_field_name_len {
                return Err(TableError::invalid_field(name, "field name too long"));
            }
            if !is_system_field(name) && !self.info.has_field(name) {
                return Err(TableError::invalid_field(name, "unknown field"));
            }
            if value.len() > self.max_field_value_len {
                return Err(TableError::invalid_field(
                    name,
                    format!(
                        "value length {} exceeds {}",
                        value.len(),
                        self.max_field_value_len
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Default [`Authorizer`]: anyone when the table lists no addresses,
/// otherwise only the listed ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableAuthorizer;

impl Authorizer for TableAuthorizer {
    fn is_authorized(&self, table: &TableInfo, origin: &Address) -> bool {
        table.authorized.is_empty() || table.authorized.contains(origin)
    }
}

/// Default [`HashFieldClassifier`]: every field except system fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFieldClassifier;

impl HashFieldClassifier for SystemFieldClassifier {
    fn is_hash_field(&self, name: &str) -> bool {
        !is_system_field(name)
    }
}
