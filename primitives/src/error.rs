//! Status codes and error types for the state table layer.
//!
//! Mutating table calls report their outcome as a non-negative row count
//! or one of the negative status codes below. The repr values are part of
//! the external contract and must not change.

use std::fmt;

/// Status codes returned across the table boundary.
///
/// `Ok` is never returned by a mutating call (those return a row count);
/// it exists so callers can normalize a result into a single code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    /// The acting identity may not mutate this table.
    NotAuthorized = -50000,
    /// A field name or value was rejected by the table schema.
    InvalidField = -50001,
    /// The backing store failed to answer.
    StoreFailure = -50002,
}

impl StatusCode {
    /// Convert from an i32 status code.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            -50000 => Some(Self::NotAuthorized),
            -50001 => Some(Self::InvalidField),
            -50002 => Some(Self::StoreFailure),
            _ => None,
        }
    }

    /// Return the i32 representation of this status code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns true if this is the `Ok` variant.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::NotAuthorized => write!(f, "CODE_NO_AUTHORIZED"),
            Self::InvalidField => write!(f, "CODE_INVALID_FIELD"),
            Self::StoreFailure => write!(f, "CODE_STORE_FAILURE"),
        }
    }
}

/// Failure to parse a hex-encoded hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// The input did not contain exactly 64 hex characters.
    #[error("expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// A non-hex character was found at this offset.
    #[error("invalid hex digit at offset {0}")]
    InvalidDigit(usize),
}
