//! Overlay table configuration.
//!
//! `TableConfig` selects how a table caches rows, which digest its state
//! commitment uses, and the limits applied by the default field validator.
//! Every field has a default, so a partial document deserializes.

use serde::{Deserialize, Serialize};
use statetable_primitives::{DigestAlgorithm, MAX_FIELD_NAME_LEN, MAX_FIELD_VALUE_LEN, MAX_KEY_LEN};

/// How a table keeps the rows it has touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// `ByIdentity` when a backing store is attached, `ByKey` otherwise.
    #[default]
    Auto,
    /// Mutated committed rows are cached by identity; inserts go to a
    /// separate new-row buffer. Requires a backing store.
    ByIdentity,
    /// Rows are cached in per-key groups, optionally seeded from the
    /// backing store on first touch.
    ByKey,
}

/// Configuration for a single overlay table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub cache_mode: CacheMode,
    /// Hash function used by the table's state commitment.
    pub digest: DigestAlgorithm,
    /// Maximum row key length in bytes.
    pub max_key_len: usize,
    /// Maximum field name length in bytes.
    pub max_field_name_len: usize,
    /// Maximum field value length in bytes.
    pub max_field_value_len: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::Auto,
            digest: DigestAlgorithm::Sha256,
            max_key_len: MAX_KEY_LEN,
            max_field_name_len: MAX_FIELD_NAME_LEN,
            max_field_value_len: MAX_FIELD_VALUE_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = TableConfig::default();
        assert_eq!(config.cache_mode, CacheMode::Auto);
        assert_eq!(config.digest, DigestAlgorithm::Sha256);
        assert_eq!(config.max_key_len, MAX_KEY_LEN);
        assert_eq!(config.max_field_name_len, MAX_FIELD_NAME_LEN);
        assert_eq!(config.max_field_value_len, MAX_FIELD_VALUE_LEN);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: TableConfig =
            serde_json::from_str(r#"{"cache_mode": "by_key", "digest": "blake3"}"#).unwrap();
        assert_eq!(config.cache_mode, CacheMode::ByKey);
        assert_eq!(config.digest, DigestAlgorithm::Blake3);
        assert_eq!(config.max_key_len, MAX_KEY_LEN);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = TableConfig {
            max_field_value_len: 16,
            ..TableConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: TableConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
