//! Error types for overlay tables and backing stores.
//!
//! `TableError` is returned by the fallible `try_*` table operations. The
//! legacy-contract operations fold it into a row count or the
//! not-authorized sentinel; [`TableError::status_code`] gives the
//! matching numeric code for callers that report one.

use statetable_primitives::StatusCode;

/// Failure reported by a [`BackingStore`](crate::store::BackingStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused the query.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A commit referenced a table the store does not know.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A commit referenced a row identity the store does not know.
    #[error("unknown row {id} in table {table}")]
    UnknownRow { table: String, id: u64 },
}

/// Top-level error type for overlay table operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// The acting identity may not mutate this table.
    #[error("origin {origin} is not authorized to modify table {table}")]
    NotAuthorized { table: String, origin: String },

    /// A field name or value was rejected by the table schema.
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// The row key was rejected.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Backing store error while resolving rows.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TableError {
    /// Numeric status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAuthorized { .. } => StatusCode::NotAuthorized,
            Self::InvalidField { .. } | Self::InvalidKey(_) => StatusCode::InvalidField,
            Self::Store(_) => StatusCode::StoreFailure,
        }
    }

    pub(crate) fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
