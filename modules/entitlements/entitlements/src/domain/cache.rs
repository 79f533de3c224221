//! Per-subject memoization of resolved statuses.
//!
//! Entries fresher than the TTL are served without resolving. When the
//! resolver fails, a stale entry inside the grace window is served instead;
//! with nothing cached the caller gets free-trial limits. Fail-open for
//! lockout, fail-closed for premium: paid access only ever comes from a
//! positive resolution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use entitlements_sdk::{PlanLimits, ResolvedStatus, Subject, SubscriptionState};
use moka::future::Cache;

use crate::config::EntitlementsConfig;

use super::resolver::StatusResolver;

#[derive(Clone)]
struct CacheEntry {
    value: ResolvedStatus,
    computed_at: Instant,
}

pub struct EntitlementCache {
    resolver: Arc<StatusResolver>,
    entries: Cache<Subject, CacheEntry>,
    ttl: Duration,
    free_trial_limits: PlanLimits,
}

impl EntitlementCache {
    #[must_use]
    pub fn new(resolver: Arc<StatusResolver>, config: &EntitlementsConfig) -> Self {
        // Eviction at ttl × grace bounds how stale a degraded read can get;
        // freshness within that window stays this cache's decision.
        let entries = Cache::builder()
            .max_capacity(config.cache_max_entries)
            .time_to_live(config.cache_ttl * config.cache_grace_multiplier.max(1))
            .build();

        Self {
            resolver,
            entries,
            ttl: config.cache_ttl,
            free_trial_limits: config.free_trial_limits,
        }
    }

    /// Cached status if fresh, otherwise a new resolution.
    ///
    /// Resolution is not locked: concurrent misses may resolve redundantly,
    /// and the most recent completed resolution wins the slot.
    pub async fn get_or_resolve(&self, subject: &Subject) -> ResolvedStatus {
        if let Some(entry) = self.entries.get(subject).await {
            if entry.computed_at.elapsed() < self.ttl {
                return entry.value;
            }
        }

        self.resolve_and_store(subject).await
    }

    /// Drop the subject's entry and resolve anew.
    pub async fn force_refresh(&self, subject: &Subject) -> ResolvedStatus {
        self.invalidate(subject).await;
        self.resolve_and_store(subject).await
    }

    pub async fn invalidate(&self, subject: &Subject) {
        self.entries.invalidate(subject).await;
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    async fn resolve_and_store(&self, subject: &Subject) -> ResolvedStatus {
        match self.resolver.resolve(subject).await {
            Ok(value) => {
                self.entries
                    .insert(
                        subject.clone(),
                        CacheEntry {
                            value: value.clone(),
                            computed_at: Instant::now(),
                        },
                    )
                    .await;
                value
            }
            Err(err) => {
                tracing::warn!(
                    subject = %subject,
                    error = %err,
                    "status resolution failed; serving degraded view"
                );

                // Anything still cached is inside the grace window (older
                // entries were evicted) and beats the conservative default.
                if let Some(entry) = self.entries.get(subject).await {
                    return entry.value;
                }

                ResolvedStatus::free_tier(SubscriptionState::None, self.free_trial_limits)
            }
        }
    }
}
