//! `statetable-primitives`: foundational types for the state table layer.
//!
//! This crate provides the canonical hash/address aliases, field and key
//! limits, the status codes returned by mutating table calls, and the
//! digest functions used for table state commitments.

pub mod types;
pub mod error;
pub mod crypto;

// Re-export commonly used types at the crate root for convenience.
pub use types::{
    Hash, Address, BlockNumber, MAX_KEY_LEN, MAX_FIELD_NAME_LEN, MAX_FIELD_VALUE_LEN,
    ZERO_HASH, ZERO_ADDRESS,
};
pub use error::{StatusCode, HexError};
pub use crypto::DigestAlgorithm;
