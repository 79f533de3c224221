//! The single status-resolution algorithm.
//!
//! Every path into the engine — cached reads, forced refreshes, periodic
//! validation, realtime change reactions — converges here. The durable
//! record store decides whether features may be used; the billing provider
//! is a secondary signal that never grants access directly on this path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use entitlements_sdk::{
    EntitlementStatus, PlanLimits, ResolvedStatus, Subject, SubscriptionState,
};
use tokio::time::timeout;

use crate::config::EntitlementsConfig;

use super::error::ResolveError;
use super::ports::BillingClient;
use super::store::RecordStore;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

pub struct StatusResolver {
    store: Arc<RecordStore>,
    billing: Arc<dyn BillingClient>,
    trial_window: chrono::Duration,
    free_trial_limits: PlanLimits,
    call_timeout: Duration,
}

impl StatusResolver {
    #[must_use]
    pub fn new(
        store: Arc<RecordStore>,
        billing: Arc<dyn BillingClient>,
        config: &EntitlementsConfig,
    ) -> Self {
        Self {
            store,
            billing,
            trial_window: chrono::Duration::from_std(config.trial_window)
                .unwrap_or_else(|_| chrono::Duration::days(7)),
            free_trial_limits: config.free_trial_limits,
            call_timeout: config.external_call_timeout,
        }
    }

    /// Resolve the current entitlement for a subject.
    ///
    /// Absence of entitlement is a normal result (`state: None`), not an
    /// error. Source priority, first match wins:
    ///
    /// 1. no record → free-trial limits;
    /// 2. record `active` → premium, billing provider not consulted;
    /// 3. record `pending` inside the trial window → free trial;
    /// 4. anything else → free-trial limits (never a hard lockout);
    /// 5. the billing provider is consulted only when no record granted
    ///    access, and only to flag a pending sync.
    ///
    /// # Errors
    ///
    /// [`ResolveError`] when the record store is unreachable in both
    /// credential modes or the lookup times out. Callers fall back to a
    /// cached or conservative status.
    #[tracing::instrument(skip_all, fields(subject = %subject))]
    pub async fn resolve(&self, subject: &Subject) -> Result<ResolvedStatus, ResolveError> {
        let record = timeout(self.call_timeout, self.store.find(subject))
            .await
            .map_err(|_| ResolveError::Timeout(self.call_timeout))??;

        let Some(record) = record else {
            tracing::debug!("no entitlement record; defaulting to free-trial limits");
            self.report_billing_signal(subject).await;
            return Ok(ResolvedStatus::free_tier(
                SubscriptionState::None,
                self.free_trial_limits,
            ));
        };

        match record.status {
            EntitlementStatus::Active => {
                // Deliberate override: manual/admin/alternate-payment grants
                // are honored without asking the billing provider.
                Ok(ResolvedStatus::premium())
            }
            EntitlementStatus::Pending => {
                let expires_at = record.created_at + self.trial_window;
                let remaining = expires_at.signed_duration_since(Utc::now());
                if remaining > chrono::Duration::zero() {
                    let days =
                        (remaining.num_seconds() as u64).div_ceil(SECONDS_PER_DAY as u64) as i64;
                    tracing::debug!(days_remaining = days, "free trial active");
                    Ok(ResolvedStatus::free_trial(days, self.free_trial_limits))
                } else {
                    // A lapsed trial counts as absent even if no writer ever
                    // expired the record.
                    tracing::debug!("trial window lapsed");
                    self.report_billing_signal(subject).await;
                    Ok(ResolvedStatus::free_tier(
                        SubscriptionState::Expired,
                        self.free_trial_limits,
                    ))
                }
            }
            EntitlementStatus::Cancelled | EntitlementStatus::Expired => {
                self.report_billing_signal(subject).await;
                Ok(ResolvedStatus::free_tier(
                    record.status.into(),
                    self.free_trial_limits,
                ))
            }
        }
    }

    /// Informational check of the billing provider on non-entitled paths.
    ///
    /// A positive signal here means the durable store is behind the billing
    /// provider; the periodic validator owns the actual sync, so this only
    /// logs. Failures are ignored: the provider is optional on this path.
    async fn report_billing_signal(&self, subject: &Subject) {
        if !self.billing.is_configured() {
            return;
        }

        match timeout(self.call_timeout, self.billing.entitlement_snapshot()).await {
            Ok(Ok(snapshot)) if snapshot.has_active_subscription => {
                tracing::warn!(
                    subject = %subject,
                    "billing provider reports an active subscription with no matching record; periodic validation will sync it"
                );
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "billing snapshot unavailable during resolution");
            }
            Err(_) => {
                tracing::debug!("billing snapshot timed out during resolution");
            }
        }
    }
}
