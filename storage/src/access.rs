//! Per-call access options.

use statetable_primitives::{Address, ZERO_ADDRESS};

/// Whether a mutating call is authorization-checked, and on whose behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOptions {
    pub enforce_authorization: bool,
    pub acting_identity: Address,
}

impl AccessOptions {
    /// Skip the authorization check (system-internal writes).
    pub fn unchecked() -> Self {
        Self {
            enforce_authorization: false,
            acting_identity: ZERO_ADDRESS,
        }
    }

    /// Check that `origin` may mutate the table.
    pub fn checked(origin: Address) -> Self {
        Self {
            enforce_authorization: true,
            acting_identity: origin,
        }
    }
}

impl Default for AccessOptions {
    fn default() -> Self {
        Self::unchecked()
    }
}
