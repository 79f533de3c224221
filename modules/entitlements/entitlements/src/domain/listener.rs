//! Realtime reaction to record-store mutations.
//!
//! Subscribes to the store's mutation feed, keeps only events for the
//! tracked subject, classifies them for operational visibility, and forces
//! an immediate re-resolution so gating state reflects the change without
//! waiting for the next periodic tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use entitlements_sdk::{EntitlementRecord, EntitlementStatus, Subject};
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EntitlementsConfig;

use super::cache::EntitlementCache;
use super::ports::{FeedError, FeedEvent, FeedEventKind, FeedScope, RealtimeFeed};

const CHANGE_BUS_CAPACITY: usize = 16;

/// Best-effort classification of a record mutation.
///
/// The recency heuristic can mistake a fast automated sync for a manual
/// edit; treat this as an operational annotation, never as a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChangeKind {
    ManualUpgrade,
    ManualDowngrade,
    AdminAction,
    StatusChange,
}

/// A classified mutation of the tracked subject's record.
#[derive(Debug, Clone)]
pub struct RecordChange {
    pub kind: RecordChangeKind,
    pub record: EntitlementRecord,
}

/// Classify a feed event.
///
/// Creates are plain status changes. Updates whose `updated_at` falls
/// within `manual_change_window` of `now` are inferred to be
/// human-triggered and mapped by the new status; older updates read as
/// background/system sync.
#[must_use]
pub fn classify_change(
    event: &FeedEvent,
    now: DateTime<Utc>,
    manual_change_window: chrono::Duration,
) -> RecordChangeKind {
    if event.kinds.contains(&FeedEventKind::Create) {
        return RecordChangeKind::StatusChange;
    }

    let age = now.signed_duration_since(event.payload.updated_at);
    if age <= manual_change_window {
        match event.payload.status {
            EntitlementStatus::Active => RecordChangeKind::ManualUpgrade,
            EntitlementStatus::Cancelled | EntitlementStatus::Expired => {
                RecordChangeKind::ManualDowngrade
            }
            EntitlementStatus::Pending => RecordChangeKind::AdminAction,
        }
    } else {
        RecordChangeKind::StatusChange
    }
}

pub struct ChangeListener {
    feed: Arc<dyn RealtimeFeed>,
    core: Arc<Core>,
    listening: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    feed_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeListener {
    #[must_use]
    pub fn new(
        feed: Arc<dyn RealtimeFeed>,
        cache: Arc<EntitlementCache>,
        config: &EntitlementsConfig,
    ) -> Self {
        let (changes_tx, _) = broadcast::channel(CHANGE_BUS_CAPACITY);

        Self {
            feed,
            core: Arc::new(Core {
                cache,
                manual_change_window: chrono::Duration::from_std(config.manual_change_window)
                    .unwrap_or_else(|_| chrono::Duration::minutes(5)),
                subject: RwLock::new(None),
                changes_tx: Mutex::new(Some(changes_tx)),
            }),
            listening: AtomicBool::new(false),
            cancel: Mutex::new(None),
            feed_task: Mutex::new(None),
        }
    }

    /// Receive classified changes for the tracked subject.
    ///
    /// Returns `None` once the listener has been destroyed.
    #[must_use]
    pub fn subscribe_changes(&self) -> Option<broadcast::Receiver<RecordChange>> {
        self.core
            .changes_tx
            .lock()
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    /// Subscribe to the record feed and start reacting to mutations.
    ///
    /// Idempotent: calling while already listening logs and does nothing,
    /// so no duplicate subscriptions are ever created.
    ///
    /// # Errors
    ///
    /// [`FeedError`] when the feed subscription cannot be established; the
    /// listener stays stopped and a later call may retry.
    pub async fn start_listening(&self, subject: Subject) -> Result<(), FeedError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            tracing::debug!(subject = %subject, "realtime listener already active");
            return Ok(());
        }

        let stream = match self.feed.subscribe(FeedScope::EntitlementRecords).await {
            Ok(stream) => stream,
            Err(err) => {
                self.listening.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        *self.core.subject.write() = Some(subject.clone());

        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());

        let core = Arc::clone(&self.core);
        let handle = tokio::spawn(async move {
            let mut stream = stream;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    event = stream.next() => match event {
                        Some(event) => core.handle_event(event).await,
                        None => {
                            tracing::info!("realtime feed closed");
                            break;
                        }
                    },
                }
            }
        });
        *self.feed_task.lock() = Some(handle);

        tracing::info!(subject = %subject, "listening for entitlement record changes");
        Ok(())
    }

    /// Tear down the feed subscription.
    pub async fn stop_listening(&self) {
        if !self.listening.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }

        let handle = self.feed_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        *self.core.subject.write() = None;
        tracing::info!("realtime listener stopped");
    }

    /// Stop listening and close the change bus; for application teardown.
    pub async fn destroy(&self) {
        self.stop_listening().await;
        // Dropping the sender closes every subscriber's receiver.
        *self.core.changes_tx.lock() = None;
    }
}

/// Event-handling state, shared with the feed task.
struct Core {
    cache: Arc<EntitlementCache>,
    manual_change_window: chrono::Duration,
    subject: RwLock<Option<Subject>>,
    changes_tx: Mutex<Option<broadcast::Sender<RecordChange>>>,
}

impl Core {
    async fn handle_event(&self, event: FeedEvent) {
        let Some(subject) = self.subject.read().clone() else {
            return;
        };

        if event.payload.subject != subject {
            tracing::trace!(
                event_subject = %event.payload.subject,
                "record event for another subject ignored"
            );
            return;
        }

        let kind = classify_change(&event, Utc::now(), self.manual_change_window);
        tracing::info!(
            subject = %subject,
            kind = ?kind,
            status = %event.payload.status,
            "entitlement record changed"
        );

        if let Some(tx) = self.changes_tx.lock().as_ref() {
            let _ = tx.send(RecordChange {
                kind,
                record: event.payload,
            });
        }

        // Invalidate-and-resolve so UI-facing state reflects the change
        // without waiting for the next periodic tick.
        let refreshed = self.cache.force_refresh(&subject).await;
        tracing::debug!(
            is_premium = refreshed.is_premium,
            state = %refreshed.state,
            "entitlement re-resolved after record change"
        );
    }
}
