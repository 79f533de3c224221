//! Domain error types and conversions to the SDK error surface.

use std::time::Duration;

use entitlements_sdk::EntitlementsError;

use super::ports::StoreError;

/// Why a resolution attempt failed.
///
/// Absence of entitlement is never an error; this only covers source
/// failures. Callers degrade to a cached or conservative status.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("record store lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("record store lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl From<StoreError> for EntitlementsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transport { message }
            | StoreError::CredentialModeConflict { message }
            | StoreError::Denied { message } => Self::store_unavailable(message),
        }
    }
}
