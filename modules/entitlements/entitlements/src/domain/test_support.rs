//! Shared mocks and fixtures for domain tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use entitlements_sdk::{EntitlementRecord, EntitlementStatus, RecordPatch, Subject};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::EntitlementsConfig;

use super::ports::{BillingClient, BillingError, BillingSnapshot, RecordStoreClient, StoreError};

pub(crate) fn test_config() -> EntitlementsConfig {
    EntitlementsConfig {
        cache_ttl: Duration::from_millis(200),
        cache_grace_multiplier: 3,
        validation_interval: Duration::from_millis(100),
        min_refresh_gap: Duration::from_millis(100),
        external_call_timeout: Duration::from_secs(2),
        ..EntitlementsConfig::default()
    }
}

pub(crate) fn record(
    subject: &Subject,
    status: EntitlementStatus,
    created_days_ago: i64,
) -> EntitlementRecord {
    let created_at = Utc::now() - chrono::Duration::days(created_days_ago);
    EntitlementRecord {
        id: Uuid::new_v4(),
        subject: subject.clone(),
        status,
        plan_id: None,
        payment_platform: Some("manual".to_owned()),
        created_at,
        updated_at: created_at,
        notes: None,
    }
}

/// Programmable record-store client with call counters.
#[derive(Default)]
pub(crate) struct MockStoreClient {
    pub records: Mutex<Vec<EntitlementRecord>>,
    pub find_calls: AtomicUsize,
    pub writes: Mutex<Vec<(Subject, RecordPatch)>>,
    pub fail_find: Mutex<Option<StoreError>>,
    pub fail_write_for: Mutex<Option<Subject>>,
}

impl MockStoreClient {
    pub fn with_records(records: Vec<EntitlementRecord>) -> Arc<Self> {
        let client = Self::default();
        *client.records.lock() = records;
        Arc::new(client)
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn find_count(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStoreClient for MockStoreClient {
    async fn find_by_subject(
        &self,
        subject: &Subject,
        limit: usize,
    ) -> Result<Vec<EntitlementRecord>, StoreError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.fail_find.lock().clone() {
            return Err(err);
        }

        Ok(self
            .records
            .lock()
            .iter()
            .filter(|record| record.subject == *subject)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        subject: &Subject,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError> {
        if self.fail_write_for.lock().as_ref() == Some(subject) {
            return Err(StoreError::transport("simulated write failure"));
        }

        let now = Utc::now();
        let created = EntitlementRecord {
            id: Uuid::new_v4(),
            subject: subject.clone(),
            status: patch.status.unwrap_or(EntitlementStatus::Pending),
            plan_id: patch.plan_id.clone(),
            payment_platform: patch.payment_platform.clone(),
            created_at: now,
            updated_at: now,
            notes: patch.notes.clone(),
        };

        self.records.lock().push(created.clone());
        self.writes.lock().push((subject.clone(), patch));
        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError> {
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| StoreError::transport(format!("record {id} not found")))?;

        if self.fail_write_for.lock().as_ref() == Some(&record.subject) {
            return Err(StoreError::transport("simulated write failure"));
        }

        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(plan_id) = patch.plan_id.clone() {
            record.plan_id = Some(plan_id);
        }
        if let Some(payment_platform) = patch.payment_platform.clone() {
            record.payment_platform = Some(payment_platform);
        }
        if let Some(notes) = patch.notes.clone() {
            record.notes = Some(notes);
        }
        record.updated_at = Utc::now();

        let updated = record.clone();
        let subject = updated.subject.clone();
        drop(records);

        self.writes.lock().push((subject, patch));
        Ok(updated)
    }
}

/// Billing client with a programmable snapshot and call counter.
pub(crate) struct MockBillingClient {
    pub configured: bool,
    pub snapshot: Mutex<Result<BillingSnapshot, BillingError>>,
    pub calls: AtomicUsize,
    /// Artificial latency per snapshot call; lets tests overlap passes.
    pub hold: Mutex<Option<Duration>>,
}

impl MockBillingClient {
    pub fn active(has_active_subscription: bool) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            snapshot: Mutex::new(Ok(BillingSnapshot {
                has_active_subscription,
                original_user_id: Some("billing-user-1".to_owned()),
                entitlement_ids: vec!["premium_monthly".to_owned()],
            })),
            calls: AtomicUsize::new(0),
            hold: Mutex::new(None),
        })
    }

    pub fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            snapshot: Mutex::new(Err(BillingError::NotConfigured)),
            calls: AtomicUsize::new(0),
            hold: Mutex::new(None),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingClient for MockBillingClient {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn entitlement_snapshot(&self) -> Result<BillingSnapshot, BillingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let hold = *self.hold.lock();
        if let Some(hold) = hold {
            tokio::time::sleep(hold).await;
        }

        self.snapshot.lock().clone()
    }
}
