//! Static billing client: fixed data for local mode and tests.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::ports::{BillingClient, BillingError, BillingSnapshot};

/// A billing provider with a fixed, manually togglable state.
pub struct StaticBillingClient {
    configured: bool,
    snapshot: RwLock<BillingSnapshot>,
}

impl StaticBillingClient {
    /// A configured provider reporting the given subscription state.
    #[must_use]
    pub fn new(has_active_subscription: bool) -> Self {
        Self {
            configured: true,
            snapshot: RwLock::new(BillingSnapshot {
                has_active_subscription,
                original_user_id: None,
                entitlement_ids: Vec::new(),
            }),
        }
    }

    /// A provider that reports itself as not configured.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            snapshot: RwLock::new(BillingSnapshot {
                has_active_subscription: false,
                original_user_id: None,
                entitlement_ids: Vec::new(),
            }),
        }
    }

    pub fn set_active(&self, has_active_subscription: bool) {
        self.snapshot.write().has_active_subscription = has_active_subscription;
    }
}

#[async_trait]
impl BillingClient for StaticBillingClient {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn entitlement_snapshot(&self) -> Result<BillingSnapshot, BillingError> {
        if !self.configured {
            return Err(BillingError::NotConfigured);
        }
        Ok(self.snapshot.read().clone())
    }
}
