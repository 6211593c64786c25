//! Core type aliases and constants for the state table layer.
//!
//! These types are shared by the overlay tables, the backing stores they
//! read from, and the transaction managers that drive them.

use crate::error::HexError;

/// 32-byte hash used for block hashes and table state commitments.
pub type Hash = [u8; 32];

/// 32-byte address identifying the account acting on a table.
pub type Address = [u8; 32];

/// Block number (monotonically increasing).
pub type BlockNumber = u64;

/// Maximum length of a row key in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Maximum length of a field name in bytes.
pub const MAX_FIELD_NAME_LEN: usize = 64;

/// Maximum length of a single field value in bytes.
pub const MAX_FIELD_VALUE_LEN: usize = 65_536; // 64 KiB

/// A zero-valued hash (32 zero bytes).
///
/// Returned as the state commitment of a table that changed nothing.
pub const ZERO_HASH: Hash = [0u8; 32];

/// A zero-valued address (32 zero bytes).
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Render arbitrary bytes as lowercase hex without a prefix.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", byte);
    }
    s
}

/// Convert a `Hash` to a `0x`-prefixed hex string for display purposes.
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut s = String::with_capacity(66);
    s.push_str("0x");
    s.push_str(&to_hex(hash));
    s
}

/// Parse a 64-character hex string (an optional `0x` prefix is accepted)
/// into a `Hash`.
pub fn hash_from_hex(hex: &str) -> Result<Hash, HexError> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.len() != 64 {
        return Err(HexError::InvalidLength(hex.len()));
    }
    if let Some(pos) = hex.find(|c: char| !c.is_ascii_hexdigit()) {
        return Err(HexError::InvalidDigit(pos));
    }
    let mut hash = [0u8; 32];
    for (i, byte) in hash.iter_mut().enumerate() {
        let pair = &hex[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(pair, 16).map_err(|_| HexError::InvalidDigit(i * 2))?;
    }
    Ok(hash)
}
