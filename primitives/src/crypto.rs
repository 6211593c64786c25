//! Digest functions for table state commitments.
//!
//! SHA-256 is the default commitment hash. BLAKE3 is available for
//! deployments that fold table commitments into a BLAKE3 state root.
//! Both are pure functions of their input.

use serde::{Deserialize, Serialize};

use crate::types::Hash;

/// Compute BLAKE3 hash of the input data.
pub fn hash_blake3(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Compute SHA-256 hash of the input data.
pub fn hash_sha256(data: &[u8]) -> Hash {
    use sha2::Digest;
    let result = sha2::Sha256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hash function used to produce a table state commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    /// Hash `data` with this algorithm.
    pub fn digest(self, data: &[u8]) -> Hash {
        match self {
            Self::Sha256 => hash_sha256(data),
            Self::Blake3 => hash_blake3(data),
        }
    }
}
