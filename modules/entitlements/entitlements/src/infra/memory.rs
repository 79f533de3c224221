//! In-memory record store with a realtime mutation feed.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use entitlements_sdk::{EntitlementRecord, EntitlementStatus, RecordPatch, Subject};
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::domain::ports::{
    FeedError, FeedEvent, FeedEventKind, FeedScope, FeedStream, RealtimeFeed, RecordStoreClient,
    StoreError,
};

const FEED_CAPACITY: usize = 64;

/// One record per subject, plus a broadcast feed of mutations.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<Subject, EntitlementRecord>>,
    events_tx: broadcast::Sender<FeedEvent>,
}

impl InMemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            events_tx,
        }
    }

    /// Insert a record directly, without emitting a feed event.
    pub fn seed(&self, record: EntitlementRecord) {
        self.records.write().insert(record.subject.clone(), record);
    }

    /// Current record for a subject, if any.
    #[must_use]
    pub fn get(&self, subject: &Subject) -> Option<EntitlementRecord> {
        self.records.read().get(subject).cloned()
    }

    fn publish(&self, kind: FeedEventKind, payload: EntitlementRecord) {
        let _ = self.events_tx.send(FeedEvent {
            kinds: vec![kind],
            payload,
        });
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStoreClient for InMemoryRecordStore {
    async fn find_by_subject(
        &self,
        subject: &Subject,
        limit: usize,
    ) -> Result<Vec<EntitlementRecord>, StoreError> {
        let records = self.records.read();
        Ok(records
            .get(subject)
            .cloned()
            .into_iter()
            .take(limit)
            .collect())
    }

    async fn create(
        &self,
        subject: &Subject,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError> {
        let now = Utc::now();
        let record = EntitlementRecord {
            id: Uuid::new_v4(),
            subject: subject.clone(),
            status: patch.status.unwrap_or(EntitlementStatus::Pending),
            plan_id: patch.plan_id,
            payment_platform: patch.payment_platform,
            created_at: now,
            updated_at: now,
            notes: patch.notes,
        };

        self.records
            .write()
            .insert(subject.clone(), record.clone());
        self.publish(FeedEventKind::Create, record.clone());

        Ok(record)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError> {
        let updated = {
            let mut records = self.records.write();
            let record = records
                .values_mut()
                .find(|record| record.id == id)
                .ok_or_else(|| StoreError::transport(format!("record {id} not found")))?;

            if let Some(status) = patch.status {
                record.status = status;
            }
            if let Some(plan_id) = patch.plan_id {
                record.plan_id = Some(plan_id);
            }
            if let Some(payment_platform) = patch.payment_platform {
                record.payment_platform = Some(payment_platform);
            }
            if let Some(notes) = patch.notes {
                record.notes = Some(notes);
            }
            record.updated_at = Utc::now();

            record.clone()
        };

        self.publish(FeedEventKind::Update, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl RealtimeFeed for InMemoryRecordStore {
    async fn subscribe(&self, scope: FeedScope) -> Result<FeedStream, FeedError> {
        let FeedScope::EntitlementRecords = scope;
        let stream = BroadcastStream::new(self.events_tx.subscribe())
            .filter_map(|event| async move { event.ok() });
        Ok(stream.boxed())
    }
}
