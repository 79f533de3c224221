//! Record-store access wrapper.
//!
//! Owns the concerns every caller of the durable store shares: credential
//! mode fallback, the multi-record anomaly rule, and find-then-write upsert
//! semantics (last-write-wins; concurrent writers are not serialized beyond
//! what the store itself provides).

use std::sync::Arc;

use entitlements_sdk::{EntitlementRecord, RecordPatch, Subject};
use uuid::Uuid;

use super::ports::{RecordStoreClient, StoreError};

/// Probe just past the expected single record so anomalies are observable.
const FIND_LIMIT: usize = 2;

/// Durable store access with an optional alternate-credential-mode client.
///
/// A `CredentialModeConflict` from the primary client reroutes the call to
/// the fallback client; any other error propagates as-is.
pub struct RecordStore {
    primary: Arc<dyn RecordStoreClient>,
    fallback: Option<Arc<dyn RecordStoreClient>>,
}

impl RecordStore {
    #[must_use]
    pub fn new(primary: Arc<dyn RecordStoreClient>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    #[must_use]
    pub fn with_fallback(
        primary: Arc<dyn RecordStoreClient>,
        fallback: Arc<dyn RecordStoreClient>,
    ) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
        }
    }

    /// The latest record for a subject, if any.
    ///
    /// More than one matching record is a data anomaly: the first one wins
    /// and the situation is logged for operators.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`StoreError`] when both credential modes fail.
    pub async fn find(&self, subject: &Subject) -> Result<Option<EntitlementRecord>, StoreError> {
        let records = self.find_records(subject).await?;

        if records.len() > 1 {
            tracing::warn!(
                subject = %subject,
                count = records.len(),
                "multiple entitlement records for one subject; using the first"
            );
        }

        Ok(records.into_iter().next())
    }

    /// Find-by-subject, then update in place or create.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`StoreError`] when the lookup or write fails.
    pub async fn upsert(
        &self,
        subject: &Subject,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError> {
        match self.find(subject).await? {
            Some(existing) => self.update_record(existing.id, patch).await,
            None => self.create_record(subject, patch).await,
        }
    }

    async fn find_records(
        &self,
        subject: &Subject,
    ) -> Result<Vec<EntitlementRecord>, StoreError> {
        match self.primary.find_by_subject(subject, FIND_LIMIT).await {
            Err(StoreError::CredentialModeConflict { message }) => {
                let fallback = self.fallback_for(&message)?;
                fallback.find_by_subject(subject, FIND_LIMIT).await
            }
            other => other,
        }
    }

    async fn create_record(
        &self,
        subject: &Subject,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError> {
        match self.primary.create(subject, patch.clone()).await {
            Err(StoreError::CredentialModeConflict { message }) => {
                let fallback = self.fallback_for(&message)?;
                fallback.create(subject, patch).await
            }
            other => other,
        }
    }

    async fn update_record(
        &self,
        id: Uuid,
        patch: RecordPatch,
    ) -> Result<EntitlementRecord, StoreError> {
        match self.primary.update(id, patch.clone()).await {
            Err(StoreError::CredentialModeConflict { message }) => {
                let fallback = self.fallback_for(&message)?;
                fallback.update(id, patch).await
            }
            other => other,
        }
    }

    /// The alternate-mode client, or the original conflict when none exists.
    fn fallback_for(&self, message: &str) -> Result<&Arc<dyn RecordStoreClient>, StoreError> {
        match &self.fallback {
            Some(fallback) => {
                tracing::warn!(
                    error = %message,
                    "credential mode conflict on primary store client; retrying via fallback mode"
                );
                Ok(fallback)
            }
            None => Err(StoreError::credential_conflict(message)),
        }
    }
}
