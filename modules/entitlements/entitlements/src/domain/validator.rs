//! Periodic revalidation against the billing provider.
//!
//! A background pass fetches the billing provider's view for the tracked
//! subject, syncs newly detected active/expired state into the record store,
//! and clears the cache so the next read sees it. Passes run on a repeating
//! timer and on app-foreground transitions; an in-flight flag collapses
//! overlapping triggers into the already-running pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use entitlements_sdk::{EntitlementStatus, RecordPatch, Subject};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::EntitlementsConfig;

use super::cache::EntitlementCache;
use super::ports::{AppTransition, BillingClient, BillingSnapshot, StoreError};
use super::store::RecordStore;

const RESULT_BUS_CAPACITY: usize = 16;

/// Lifecycle state of the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorState {
    Idle,
    Validating,
    Stopped,
}

/// Outcome of one validation pass, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub has_active_subscription: bool,
    pub synced_with_store: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            has_active_subscription: false,
            synced_with_store: false,
            error: Some(message.into()),
        }
    }
}

pub struct PeriodicValidator {
    core: Arc<Core>,
    interval: Duration,
    /// Timer armed; start() is a no-op while set.
    active: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    timer_task: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicValidator {
    #[must_use]
    pub fn new(
        store: Arc<RecordStore>,
        billing: Arc<dyn BillingClient>,
        cache: Arc<EntitlementCache>,
        config: &EntitlementsConfig,
    ) -> Self {
        let (results_tx, _) = broadcast::channel(RESULT_BUS_CAPACITY);

        Self {
            core: Arc::new(Core {
                store,
                billing,
                cache,
                min_refresh_gap: config.min_refresh_gap,
                call_timeout: config.external_call_timeout,
                billing_platform: config.billing_platform.clone(),
                subject: RwLock::new(None),
                state: Mutex::new(ValidatorState::Stopped),
                last_validation: Mutex::new(None),
                results_tx,
            }),
            interval: config.validation_interval,
            active: AtomicBool::new(false),
            cancel: Mutex::new(None),
            timer_task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> ValidatorState {
        *self.core.state.lock()
    }

    /// Receive the outcome of every completed pass, success or failure.
    ///
    /// Subscribers run in their own tasks; nothing they do can reach back
    /// into the validator.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ValidationResult> {
        self.core.results_tx.subscribe()
    }

    /// Track `subject` and arm the repeating validation timer.
    ///
    /// Idempotent: calling while already armed logs and does nothing.
    pub fn start(&self, subject: Subject) {
        if self.active.swap(true, Ordering::SeqCst) {
            tracing::debug!("periodic validation already active");
            return;
        }

        *self.core.subject.write() = Some(subject);
        *self.core.state.lock() = ValidatorState::Idle;

        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());

        let core = Arc::clone(&self.core);
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so the first pass lands one interval after start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        core.run_pass().await;
                    }
                }
            }
        });
        *self.timer_task.lock() = Some(handle);

        tracing::info!(interval = ?self.interval, "periodic entitlement validation started");
    }

    /// Disarm the timer and transition to `Stopped`.
    pub async fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }

        // Take the handle and drop the guard before awaiting.
        let handle = self.timer_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        *self.core.state.lock() = ValidatorState::Stopped;
        tracing::info!("periodic entitlement validation stopped");
    }

    /// React to an app-foreground transition.
    ///
    /// Revalidates unless the last pass finished inside the minimum refresh
    /// gap; rapid foreground/background toggling must not herd revalidation.
    pub async fn handle_app_foreground(&self) {
        self.core.handle_foreground().await;
    }

    /// Run one validation pass now, unless one is already in flight.
    ///
    /// Overlapping triggers are dropped, not queued: at most one pass runs
    /// at a time and its result is broadcast to all subscribers.
    pub async fn run_validation_pass(&self) {
        self.core.run_pass().await;
    }

    /// Drive foreground transitions from a lifecycle receiver.
    ///
    /// The returned handle belongs to the caller; abort it at teardown.
    pub fn bind_lifecycle(
        &self,
        mut transitions: broadcast::Receiver<AppTransition>,
    ) -> JoinHandle<()> {
        let core = Arc::clone(&self.core);
        tokio::spawn(async move {
            loop {
                match transitions.recv().await {
                    Ok(AppTransition::Foreground) => core.handle_foreground().await,
                    Ok(AppTransition::Background) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "lifecycle signal lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Pass execution state, shared with the timer and lifecycle tasks.
struct Core {
    store: Arc<RecordStore>,
    billing: Arc<dyn BillingClient>,
    cache: Arc<EntitlementCache>,
    min_refresh_gap: Duration,
    call_timeout: Duration,
    billing_platform: String,
    subject: RwLock<Option<Subject>>,
    state: Mutex<ValidatorState>,
    last_validation: Mutex<Option<Instant>>,
    results_tx: broadcast::Sender<ValidationResult>,
}

impl Core {
    async fn handle_foreground(&self) {
        let within_gap = self
            .last_validation
            .lock()
            .is_some_and(|at| at.elapsed() < self.min_refresh_gap);

        if within_gap {
            tracing::debug!("foreground revalidation skipped inside minimum refresh gap");
            return;
        }

        self.run_pass().await;
    }

    async fn run_pass(&self) {
        if !self.begin_pass() {
            return;
        }

        let result = self.validate().await;

        *self.last_validation.lock() = Some(Instant::now());
        self.finish_pass();

        if let Some(error) = &result.error {
            tracing::warn!(error = %error, "validation pass failed");
        } else {
            tracing::debug!(
                has_active_subscription = result.has_active_subscription,
                synced = result.synced_with_store,
                "validation pass completed"
            );
        }

        let _ = self.results_tx.send(result);
    }

    fn begin_pass(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ValidatorState::Idle => {
                *state = ValidatorState::Validating;
                true
            }
            ValidatorState::Validating => {
                tracing::debug!("validation already in flight; trigger dropped");
                false
            }
            ValidatorState::Stopped => {
                tracing::debug!("validator stopped; trigger dropped");
                false
            }
        }
    }

    fn finish_pass(&self) {
        let mut state = self.state.lock();
        if *state == ValidatorState::Validating {
            *state = ValidatorState::Idle;
        }
    }

    async fn validate(&self) -> ValidationResult {
        let Some(subject) = self.subject.read().clone() else {
            return ValidationResult::failure("no subject under validation");
        };

        if !self.billing.is_configured() {
            return ValidationResult::failure("billing provider is not configured");
        }

        let snapshot = match timeout(self.call_timeout, self.billing.entitlement_snapshot()).await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(err)) => return ValidationResult::failure(err.to_string()),
            Err(_) => {
                return ValidationResult::failure(format!(
                    "billing snapshot timed out after {:?}",
                    self.call_timeout
                ));
            }
        };

        let synced = match self.sync_snapshot(&subject, &snapshot).await {
            Ok(synced) => synced,
            Err(err) => {
                return ValidationResult {
                    is_valid: false,
                    has_active_subscription: snapshot.has_active_subscription,
                    synced_with_store: false,
                    error: Some(err.to_string()),
                };
            }
        };

        self.cache.invalidate(&subject).await;

        ValidationResult {
            is_valid: true,
            has_active_subscription: snapshot.has_active_subscription,
            synced_with_store: synced,
            error: None,
        }
    }

    /// Reconcile the billing snapshot into the record store.
    ///
    /// Only billing-owned records (matching `payment_platform`) are ever
    /// downgraded; manual and admin grants belong to the admin operations.
    /// A positive billing signal upgrades regardless: a real purchase is an
    /// earned entitlement.
    async fn sync_snapshot(
        &self,
        subject: &Subject,
        snapshot: &BillingSnapshot,
    ) -> Result<bool, StoreError> {
        let record = timeout(self.call_timeout, self.store.find(subject))
            .await
            .map_err(|_| StoreError::transport("record store lookup timed out"))??;

        let billing_owned = record.as_ref().is_some_and(|r| {
            r.payment_platform.as_deref() == Some(self.billing_platform.as_str())
        });

        let patch = match (&record, snapshot.has_active_subscription) {
            (None, true) => Some(RecordPatch {
                status: Some(EntitlementStatus::Active),
                plan_id: snapshot.entitlement_ids.first().cloned(),
                payment_platform: Some(self.billing_platform.clone()),
                notes: Some("synced from billing provider".to_owned()),
            }),
            (Some(existing), true) if existing.status != EntitlementStatus::Active => {
                Some(RecordPatch {
                    status: Some(EntitlementStatus::Active),
                    plan_id: snapshot.entitlement_ids.first().cloned(),
                    payment_platform: Some(self.billing_platform.clone()),
                    notes: Some("reactivated from billing provider".to_owned()),
                })
            }
            (Some(existing), false)
                if existing.status == EntitlementStatus::Active && billing_owned =>
            {
                Some(RecordPatch {
                    status: Some(EntitlementStatus::Expired),
                    plan_id: None,
                    payment_platform: None,
                    notes: Some("expired by billing provider".to_owned()),
                })
            }
            _ => None,
        };

        let Some(patch) = patch else {
            return Ok(false);
        };

        timeout(self.call_timeout, self.store.upsert(subject, patch))
            .await
            .map_err(|_| StoreError::transport("record store upsert timed out"))??;

        tracing::info!(
            subject = %subject,
            has_active_subscription = snapshot.has_active_subscription,
            "billing state synced into record store"
        );

        Ok(true)
    }
}
