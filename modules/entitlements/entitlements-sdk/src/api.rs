//! `EntitlementsApi` trait definition.
//!
//! This trait defines the public API of the entitlement engine. Status
//! reads are infallible by design: on any resolution failure the caller
//! receives a conservative free-tier status rather than an error, so the
//! paywall can never lock a user out of the app on a transient fault.

use async_trait::async_trait;

use crate::errors::EntitlementsError;
use crate::models::{
    BulkGrantOutcome, EntitlementRecord, ExternalSubscriptionUpdate, Gate, GrantOptions,
    ResolvedStatus, RevokeOptions, Subject, TrialOptions,
};

/// Public API trait for the entitlements module.
#[async_trait]
pub trait EntitlementsApi: Send + Sync {
    /// Current entitlement for a subject, served from the cache when fresh.
    async fn get_subscription_status(&self, subject: &Subject) -> ResolvedStatus;

    /// Drop any cached entry for the subject and resolve anew.
    async fn force_refresh(&self, subject: &Subject) -> ResolvedStatus;

    /// Whether the subject may create another company.
    async fn can_create_company(&self, subject: &Subject, current_count: u64) -> Gate;

    /// Whether the subject may create another cashbook.
    async fn can_create_cashbook(&self, subject: &Subject, current_count: u64) -> Gate;

    /// Whether the subject may record another transaction in a cashbook.
    async fn can_create_transaction(&self, subject: &Subject, current_count: u64) -> Gate;

    /// Grant premium access, bypassing the billing provider.
    async fn grant_premium_access(
        &self,
        subject: &Subject,
        opts: GrantOptions,
    ) -> Result<EntitlementRecord, EntitlementsError>;

    /// Start (or resume) a free trial anchored to the record's creation time.
    ///
    /// Re-invoking on an existing record does not reset the trial window.
    async fn start_free_trial(
        &self,
        subject: &Subject,
        opts: TrialOptions,
    ) -> Result<EntitlementRecord, EntitlementsError>;

    /// Revoke premium access (record becomes `expired`).
    async fn revoke_premium_access(
        &self,
        subject: &Subject,
        opts: RevokeOptions,
    ) -> Result<EntitlementRecord, EntitlementsError>;

    /// Cancel a subscription (record becomes `cancelled`).
    async fn cancel_subscription(
        &self,
        subject: &Subject,
        opts: RevokeOptions,
    ) -> Result<EntitlementRecord, EntitlementsError>;

    /// Record a subscription managed by an external payment provider.
    async fn set_external_subscription(
        &self,
        subject: &Subject,
        update: ExternalSubscriptionUpdate,
    ) -> Result<EntitlementRecord, EntitlementsError>;

    /// Grant premium to many subjects, collecting per-subject outcomes.
    ///
    /// Individual failures never abort the batch.
    async fn bulk_grant_premium(
        &self,
        subjects: &[Subject],
        opts: GrantOptions,
    ) -> BulkGrantOutcome;
}
