//! Consumed interfaces: the leaf clients the engine is wired with.
//!
//! The record store, billing provider, realtime feed, and app lifecycle are
//! external collaborators. Their failures are ordinary values of the error
//! kinds below; fallback selection is plain branching on those kinds, never
//! control flow by panic.

use async_trait::async_trait;
use entitlements_sdk::{EntitlementRecord, RecordPatch, Subject};
use futures::stream::BoxStream;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Failures of the durable record store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record store transport failure: {message}")]
    Transport { message: String },

    /// Two incompatible access-credential modes were used in the same call.
    /// The caller is expected to retry through the alternate mode.
    #[error("access credential mode conflict: {message}")]
    CredentialModeConflict { message: String },

    #[error("record store denied the operation: {message}")]
    Denied { message: String },
}

impl StoreError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn credential_conflict(message: impl Into<String>) -> Self {
        Self::CredentialModeConflict {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn denied(message: impl Into<String>) -> Self {
        Self::Denied {
            message: message.into(),
        }
    }
}

/// Read/write access to durable entitlement records.
///
/// Filters are always an equality match on the normalized subject.
#[async_trait]
pub trait RecordStoreClient: Send + Sync {
    /// Records whose subject matches, newest first, at most `limit`.
    async fn find_by_subject(
        &self,
        subject: &Subject,
        limit: usize,
    ) -> Result<Vec<EntitlementRecord>, StoreError>;

    async fn create(
        &self,
        subject: &Subject,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError>;

    async fn update(
        &self,
        id: Uuid,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError>;
}

/// The billing provider's view of the current device/user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingSnapshot {
    pub has_active_subscription: bool,
    pub original_user_id: Option<String>,
    pub entitlement_ids: Vec<String>,
}

/// Failures of the billing provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    #[error("billing provider is not configured")]
    NotConfigured,

    #[error("billing provider transport failure: {message}")]
    Transport { message: String },
}

/// Read-only access to the external billing provider.
#[async_trait]
pub trait BillingClient: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn entitlement_snapshot(&self) -> Result<BillingSnapshot, BillingError>;
}

/// What a realtime feed event did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEventKind {
    Create,
    Update,
    Delete,
}

/// One mutation pushed by the record store's realtime feed.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub kinds: Vec<FeedEventKind>,
    pub payload: EntitlementRecord,
}

/// Collections a feed subscription can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    EntitlementRecords,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("realtime feed transport failure: {message}")]
    Transport { message: String },
}

pub type FeedStream = BoxStream<'static, FeedEvent>;

/// Realtime mutation feed of the record store.
#[async_trait]
pub trait RealtimeFeed: Send + Sync {
    async fn subscribe(&self, scope: FeedScope) -> Result<FeedStream, FeedError>;
}

/// Application lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTransition {
    Foreground,
    Background,
}

/// Emitter of foreground/background transitions.
pub trait LifecycleSignal: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<AppTransition>;
}
