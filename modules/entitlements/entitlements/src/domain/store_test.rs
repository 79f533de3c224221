#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use entitlements_sdk::{EntitlementStatus, RecordPatch, Subject};

    use crate::domain::ports::StoreError;
    use crate::domain::store::RecordStore;
    use crate::domain::test_support::{MockStoreClient, record};

    #[tokio::test]
    async fn credential_conflict_falls_back_to_alternate_mode() {
        let subject = Subject::new("ada@example.com");
        let primary = MockStoreClient::empty();
        *primary.fail_find.lock() = Some(StoreError::credential_conflict(
            "session and api key used together",
        ));
        let fallback = MockStoreClient::with_records(vec![record(
            &subject,
            EntitlementStatus::Active,
            1,
        )]);

        let store = RecordStore::with_fallback(primary.clone(), fallback.clone());
        let found = store.find(&subject).await.unwrap();

        assert_eq!(found.unwrap().status, EntitlementStatus::Active);
        assert_eq!(primary.find_count(), 1);
        assert_eq!(fallback.find_count(), 1);
    }

    #[tokio::test]
    async fn credential_conflict_without_fallback_propagates() {
        let subject = Subject::new("ada@example.com");
        let primary = MockStoreClient::empty();
        *primary.fail_find.lock() = Some(StoreError::credential_conflict("mode conflict"));

        let store = RecordStore::new(primary);
        let result = store.find(&subject).await;

        assert!(matches!(
            result,
            Err(StoreError::CredentialModeConflict { .. })
        ));
    }

    #[tokio::test]
    async fn transport_errors_do_not_trigger_fallback() {
        let subject = Subject::new("ada@example.com");
        let primary = MockStoreClient::empty();
        *primary.fail_find.lock() = Some(StoreError::transport("down"));
        let fallback = MockStoreClient::empty();

        let store = RecordStore::with_fallback(primary, fallback.clone());
        let result = store.find(&subject).await;

        assert!(matches!(result, Err(StoreError::Transport { .. })));
        assert_eq!(
            fallback.find_count(),
            0,
            "only credential conflicts reroute to the fallback mode"
        );
    }

    #[tokio::test]
    async fn find_takes_the_first_of_duplicate_records() {
        let subject = Subject::new("dup@example.com");
        let first = record(&subject, EntitlementStatus::Active, 1);
        let second = record(&subject, EntitlementStatus::Expired, 2);
        let client = MockStoreClient::with_records(vec![first.clone(), second]);

        let store = RecordStore::new(client);
        let found = store.find(&subject).await.unwrap().unwrap();

        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn upsert_updates_an_existing_record_in_place() {
        let subject = Subject::new("ada@example.com");
        let existing = record(&subject, EntitlementStatus::Pending, 3);
        let client = MockStoreClient::with_records(vec![existing.clone()]);

        let store = RecordStore::new(client.clone());
        let updated = store
            .upsert(
                &subject,
                RecordPatch {
                    status: Some(EntitlementStatus::Active),
                    ..RecordPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, existing.id, "update must not mint a new record");
        assert_eq!(updated.status, EntitlementStatus::Active);
        assert_eq!(client.records.lock().len(), 1);
    }

    #[tokio::test]
    async fn upsert_creates_when_no_record_matches() {
        let subject = Subject::new("new@example.com");
        let client = MockStoreClient::empty();

        let store = RecordStore::new(client.clone());
        let created = store
            .upsert(
                &subject,
                RecordPatch {
                    status: Some(EntitlementStatus::Active),
                    ..RecordPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(created.subject, subject);
        assert_eq!(client.records.lock().len(), 1);
    }
}
