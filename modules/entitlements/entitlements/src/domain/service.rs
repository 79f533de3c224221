//! The `EntitlementsApi` facade over cache, resolver, and admin operations.

use std::sync::Arc;

use async_trait::async_trait;
use entitlements_sdk::{
    BulkGrantOutcome, EntitlementRecord, EntitlementsApi, EntitlementsError,
    ExternalSubscriptionUpdate, Gate, GrantOptions, ResolvedStatus, RevokeOptions, Subject,
    TrialOptions,
};

use super::admin::AdminOperations;
use super::cache::EntitlementCache;
use super::limits;

pub struct EntitlementsService {
    cache: Arc<EntitlementCache>,
    admin: AdminOperations,
}

impl EntitlementsService {
    #[must_use]
    pub fn new(cache: Arc<EntitlementCache>, admin: AdminOperations) -> Self {
        Self { cache, admin }
    }
}

#[async_trait]
impl EntitlementsApi for EntitlementsService {
    async fn get_subscription_status(&self, subject: &Subject) -> ResolvedStatus {
        self.cache.get_or_resolve(subject).await
    }

    async fn force_refresh(&self, subject: &Subject) -> ResolvedStatus {
        self.cache.force_refresh(subject).await
    }

    async fn can_create_company(&self, subject: &Subject, current_count: u64) -> Gate {
        let status = self.cache.get_or_resolve(subject).await;
        limits::can_create_company(&status, current_count)
    }

    async fn can_create_cashbook(&self, subject: &Subject, current_count: u64) -> Gate {
        let status = self.cache.get_or_resolve(subject).await;
        limits::can_create_cashbook(&status, current_count)
    }

    async fn can_create_transaction(&self, subject: &Subject, current_count: u64) -> Gate {
        let status = self.cache.get_or_resolve(subject).await;
        limits::can_create_transaction(&status, current_count)
    }

    async fn grant_premium_access(
        &self,
        subject: &Subject,
        opts: GrantOptions,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        self.admin.grant_premium_access(subject, opts).await
    }

    async fn start_free_trial(
        &self,
        subject: &Subject,
        opts: TrialOptions,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        self.admin.start_free_trial(subject, opts).await
    }

    async fn revoke_premium_access(
        &self,
        subject: &Subject,
        opts: RevokeOptions,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        self.admin.revoke_premium_access(subject, opts).await
    }

    async fn cancel_subscription(
        &self,
        subject: &Subject,
        opts: RevokeOptions,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        self.admin.cancel_subscription(subject, opts).await
    }

    async fn set_external_subscription(
        &self,
        subject: &Subject,
        update: ExternalSubscriptionUpdate,
    ) -> Result<EntitlementRecord, EntitlementsError> {
        self.admin.set_external_subscription(subject, update).await
    }

    async fn bulk_grant_premium(
        &self,
        subjects: &[Subject],
        opts: GrantOptions,
    ) -> BulkGrantOutcome {
        self.admin.bulk_grant_premium(subjects, opts).await
    }
}
