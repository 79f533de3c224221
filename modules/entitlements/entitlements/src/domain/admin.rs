//! Privileged manual-override operations.
//!
//! Each operation is a thin named upsert against the record store followed
//! by unconditional cache invalidation, so support and admin tooling can
//! correct entitlements (refunds, promos, support cases) without going
//! through the billing provider.

use std::sync::Arc;

use entitlements_sdk::{
    BulkGrantOutcome, BulkGrantResult, EntitlementRecord, EntitlementStatus, EntitlementsError,
    ExternalSubscriptionUpdate, GrantOptions, RecordPatch, RevokeOptions, Subject, TrialOptions,
};

use super::cache::EntitlementCache;
use super::store::RecordStore;

/// Platform tag for grants made outside any payment provider.
const MANUAL_PLATFORM: &str = "manual";
const FREE_TRIAL_PLAN: &str = "free_trial";

pub struct AdminOperations {
    store: Arc<RecordStore>,
    cache: Arc<EntitlementCache>,
}

impl AdminOperations {
    #[must_use]
    pub fn new(store: Arc<RecordStore>, cache: Arc<EntitlementCache>) -> Self {
        Self { store, cache }
    }

    /// Grant premium access regardless of billing state.
    ///
    /// # Errors
    ///
    /// [`EntitlementsError`] when the record store rejects the upsert.
    pub async fn grant_premium_access(
        &self,
        subject: &Subject,
        opts: GrantOptions,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        let patch = RecordPatch {
            status: Some(EntitlementStatus::Active),
            plan_id: opts.plan_id,
            payment_platform: Some(opts.source.unwrap_or_else(|| MANUAL_PLATFORM.to_owned())),
            notes: opts.notes,
        };
        self.apply("grant_premium_access", subject, patch).await
    }

    /// Start a free trial.
    ///
    /// The trial window is anchored to the record's `created_at`, which the
    /// store sets once at creation; re-invoking on an existing record does
    /// not reset the window.
    ///
    /// # Errors
    ///
    /// [`EntitlementsError`] when the record store rejects the upsert.
    pub async fn start_free_trial(
        &self,
        subject: &Subject,
        opts: TrialOptions,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        let patch = RecordPatch {
            status: Some(EntitlementStatus::Pending),
            plan_id: Some(FREE_TRIAL_PLAN.to_owned()),
            payment_platform: Some(opts.source.unwrap_or_else(|| MANUAL_PLATFORM.to_owned())),
            notes: opts.notes,
        };
        self.apply("start_free_trial", subject, patch).await
    }

    /// Revoke premium access; the record becomes `expired`.
    ///
    /// # Errors
    ///
    /// [`EntitlementsError`] when the record store rejects the upsert.
    pub async fn revoke_premium_access(
        &self,
        subject: &Subject,
        opts: RevokeOptions,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        let patch = RecordPatch {
            status: Some(EntitlementStatus::Expired),
            notes: opts.notes,
            ..RecordPatch::default()
        };
        self.apply("revoke_premium_access", subject, patch).await
    }

    /// Cancel a subscription; the record becomes `cancelled`.
    ///
    /// # Errors
    ///
    /// [`EntitlementsError`] when the record store rejects the upsert.
    pub async fn cancel_subscription(
        &self,
        subject: &Subject,
        opts: RevokeOptions,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        let patch = RecordPatch {
            status: Some(EntitlementStatus::Cancelled),
            notes: opts.notes,
            ..RecordPatch::default()
        };
        self.apply("cancel_subscription", subject, patch).await
    }

    /// Record a subscription managed by an external payment provider.
    ///
    /// # Errors
    ///
    /// [`EntitlementsError`] when the record store rejects the upsert.
    pub async fn set_external_subscription(
        &self,
        subject: &Subject,
        update: ExternalSubscriptionUpdate,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        let status = if update.is_active {
            EntitlementStatus::Active
        } else {
            EntitlementStatus::Pending
        };
        let patch = RecordPatch {
            status: Some(status),
            plan_id: Some(update.plan_id),
            payment_platform: Some(update.payment_provider),
            notes: update.notes,
        };
        self.apply("set_external_subscription", subject, patch).await
    }

    /// Grant premium to many subjects sequentially.
    ///
    /// A failing subject is recorded and the batch continues.
    pub async fn bulk_grant_premium(
        &self,
        subjects: &[Subject],
        opts: GrantOptions,
    ) -> BulkGrantOutcome {
        let mut results = Vec::with_capacity(subjects.len());
        let mut successful = 0;
        let mut failed = 0;

        for subject in subjects {
            match self.grant_premium_access(subject, opts.clone()).await {
                Ok(_) => {
                    successful += 1;
                    results.push(BulkGrantResult {
                        subject: subject.clone(),
                        success: true,
                        message: None,
                    });
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!(
                        subject = %subject,
                        error = %err,
                        "bulk grant failed for subject; continuing"
                    );
                    results.push(BulkGrantResult {
                        subject: subject.clone(),
                        success: false,
                        message: Some(err.to_string()),
                    });
                }
            }
        }

        BulkGrantOutcome {
            total_processed: results.len(),
            successful,
            failed,
            results,
        }
    }

    async fn apply(
        &self,
        operation: &str,
        subject: &Subject,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        let record = self.store.upsert(subject, patch).await.map_err(|err| {
            tracing::warn!(
                operation,
                subject = %subject,
                error = %err,
                "manual override failed"
            );
            EntitlementsError::from(err)
        })?;

        self.cache.invalidate(subject).await;
        tracing::info!(
            operation,
            subject = %subject,
            status = %record.status,
            "manual override applied"
        );

        Ok(record)
    }
}
