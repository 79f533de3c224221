//! Error types for the entitlements SDK.

use thiserror::Error;

/// Errors surfaced to consumers of [`crate::EntitlementsApi`].
///
/// Status resolution itself never fails — callers always receive a
/// `ResolvedStatus`, degraded to free-trial limits when sources are
/// unreachable. These errors only arise from admin write operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntitlementsError {
    #[error("record store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("billing provider not configured")]
    BillingNotConfigured,

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("internal error")]
    Internal,
}

impl EntitlementsError {
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
