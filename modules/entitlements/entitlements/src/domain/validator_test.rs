#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use entitlements_sdk::{EntitlementStatus, Subject};

    use crate::config::EntitlementsConfig;
    use crate::domain::cache::EntitlementCache;
    use crate::domain::ports::BillingClient;
    use crate::domain::resolver::StatusResolver;
    use crate::domain::store::RecordStore;
    use crate::domain::test_support::{MockBillingClient, MockStoreClient, record, test_config};
    use crate::domain::validator::{PeriodicValidator, ValidatorState};

    fn quiet_timer_config() -> EntitlementsConfig {
        EntitlementsConfig {
            validation_interval: Duration::from_secs(3600),
            min_refresh_gap: Duration::from_millis(100),
            ..test_config()
        }
    }

    fn build(
        store: &Arc<MockStoreClient>,
        billing: &Arc<MockBillingClient>,
        config: &EntitlementsConfig,
    ) -> (Arc<PeriodicValidator>, Arc<EntitlementCache>) {
        let record_store = Arc::new(RecordStore::new(store.clone()));
        let billing_dyn: Arc<dyn BillingClient> = billing.clone();
        let resolver = Arc::new(StatusResolver::new(
            record_store.clone(),
            billing_dyn.clone(),
            config,
        ));
        let cache = Arc::new(EntitlementCache::new(resolver, config));
        let validator = Arc::new(PeriodicValidator::new(
            record_store,
            billing_dyn,
            cache.clone(),
            config,
        ));
        (validator, cache)
    }

    #[tokio::test]
    async fn overlapping_triggers_run_exactly_one_pass() {
        let store = MockStoreClient::empty();
        let billing = MockBillingClient::active(false);
        *billing.hold.lock() = Some(Duration::from_millis(200));
        let (validator, _) = build(&store, &billing, &quiet_timer_config());

        validator.start(Subject::new("ada@example.com"));

        let first = {
            let validator = validator.clone();
            tokio::spawn(async move { validator.run_validation_pass().await })
        };
        // Give the first pass time to claim the in-flight slot.
        tokio::time::sleep(Duration::from_millis(50)).await;
        validator.run_validation_pass().await;
        first.await.unwrap();

        assert_eq!(
            billing.call_count(),
            1,
            "the second trigger must collapse into the running pass"
        );
        assert_eq!(validator.state(), ValidatorState::Idle);

        validator.stop().await;
    }

    #[tokio::test]
    async fn timer_drives_passes_until_stopped() {
        let store = MockStoreClient::empty();
        let billing = MockBillingClient::active(false);
        let config = EntitlementsConfig {
            validation_interval: Duration::from_millis(120),
            ..test_config()
        };
        let (validator, _) = build(&store, &billing, &config);
        let mut results = validator.subscribe();

        validator.start(Subject::new("ada@example.com"));
        let result = tokio::time::timeout(Duration::from_secs(2), results.recv())
            .await
            .expect("timer should produce a pass")
            .unwrap();
        assert!(result.is_valid);

        validator.stop().await;
        assert_eq!(validator.state(), ValidatorState::Stopped);

        let calls_after_stop = billing.call_count();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(
            billing.call_count(),
            calls_after_stop,
            "a stopped validator must not keep validating"
        );
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let store = MockStoreClient::empty();
        let billing = MockBillingClient::active(false);
        let (validator, _) = build(&store, &billing, &quiet_timer_config());

        validator.start(Subject::new("ada@example.com"));
        validator.start(Subject::new("ada@example.com"));
        assert_eq!(validator.state(), ValidatorState::Idle);

        validator.stop().await;
        assert_eq!(validator.state(), ValidatorState::Stopped);
    }

    #[tokio::test]
    async fn unconfigured_billing_fails_pass_without_store_writes() {
        let store = MockStoreClient::empty();
        let billing = MockBillingClient::unconfigured();
        let (validator, _) = build(&store, &billing, &quiet_timer_config());
        let mut results = validator.subscribe();

        validator.start(Subject::new("ada@example.com"));
        validator.run_validation_pass().await;

        let result = results.recv().await.unwrap();
        assert!(!result.is_valid);
        assert!(!result.has_active_subscription);
        assert!(!result.synced_with_store);
        assert!(result.error.unwrap().contains("not configured"));
        assert!(store.writes.lock().is_empty());

        validator.stop().await;
    }

    #[tokio::test]
    async fn active_subscription_syncs_into_store_and_clears_cache() {
        let subject = Subject::new("ada@example.com");
        let store = MockStoreClient::empty();
        let billing = MockBillingClient::active(true);
        let config = quiet_timer_config();
        let (validator, cache) = build(&store, &billing, &config);
        let mut results = validator.subscribe();

        let before = cache.get_or_resolve(&subject).await;
        assert!(!before.is_premium);

        validator.start(subject.clone());
        validator.run_validation_pass().await;

        let result = results.recv().await.unwrap();
        assert!(result.is_valid);
        assert!(result.has_active_subscription);
        assert!(result.synced_with_store);

        let (written_subject, patch) = store.writes.lock().first().cloned().unwrap();
        assert_eq!(written_subject, subject);
        assert_eq!(patch.status, Some(EntitlementStatus::Active));
        assert_eq!(patch.payment_platform.as_deref(), Some("billing"));

        // The cache entry was invalidated; the next read sees the sync.
        let after = cache.get_or_resolve(&subject).await;
        assert!(after.is_premium);

        validator.stop().await;
    }

    #[tokio::test]
    async fn manual_grant_survives_inactive_billing() {
        let subject = Subject::new("vip@example.com");
        let store =
            MockStoreClient::with_records(vec![record(&subject, EntitlementStatus::Active, 10)]);
        let billing = MockBillingClient::active(false);
        let (validator, _) = build(&store, &billing, &quiet_timer_config());
        let mut results = validator.subscribe();

        validator.start(subject.clone());
        validator.run_validation_pass().await;

        let result = results.recv().await.unwrap();
        assert!(result.is_valid);
        assert!(!result.synced_with_store, "manual records are not billing-owned");
        assert_eq!(
            store.records.lock()[0].status,
            EntitlementStatus::Active,
            "a validation pass must never clobber a manual grant"
        );

        validator.stop().await;
    }

    #[tokio::test]
    async fn billing_owned_record_expires_when_subscription_ends() {
        let subject = Subject::new("ada@example.com");
        let mut existing = record(&subject, EntitlementStatus::Active, 10);
        existing.payment_platform = Some("billing".to_owned());
        let store = MockStoreClient::with_records(vec![existing]);
        let billing = MockBillingClient::active(false);
        let (validator, _) = build(&store, &billing, &quiet_timer_config());
        let mut results = validator.subscribe();

        validator.start(subject.clone());
        validator.run_validation_pass().await;

        let result = results.recv().await.unwrap();
        assert!(result.is_valid);
        assert!(result.synced_with_store);
        assert_eq!(store.records.lock()[0].status, EntitlementStatus::Expired);

        validator.stop().await;
    }

    #[tokio::test]
    async fn foreground_trigger_respects_minimum_gap() {
        let store = MockStoreClient::empty();
        let billing = MockBillingClient::active(false);
        let config = EntitlementsConfig {
            min_refresh_gap: Duration::from_secs(3600),
            ..quiet_timer_config()
        };
        let (validator, _) = build(&store, &billing, &config);

        validator.start(Subject::new("ada@example.com"));
        validator.run_validation_pass().await;
        assert_eq!(billing.call_count(), 1);

        validator.handle_app_foreground().await;
        assert_eq!(
            billing.call_count(),
            1,
            "foreground inside the gap must not revalidate"
        );

        validator.stop().await;
    }

    #[tokio::test]
    async fn foreground_trigger_revalidates_after_gap() {
        let store = MockStoreClient::empty();
        let billing = MockBillingClient::active(false);
        let (validator, _) = build(&store, &billing, &quiet_timer_config());

        validator.start(Subject::new("ada@example.com"));
        validator.run_validation_pass().await;
        assert_eq!(billing.call_count(), 1);

        // quiet_timer_config has a 100ms minimum gap.
        tokio::time::sleep(Duration::from_millis(150)).await;
        validator.handle_app_foreground().await;
        assert_eq!(billing.call_count(), 2);

        validator.stop().await;
    }

    #[tokio::test]
    async fn stopped_validator_drops_triggers() {
        let store = MockStoreClient::empty();
        let billing = MockBillingClient::active(false);
        let (validator, _) = build(&store, &billing, &quiet_timer_config());

        validator.start(Subject::new("ada@example.com"));
        validator.stop().await;

        validator.run_validation_pass().await;
        assert_eq!(billing.call_count(), 0);
    }
}
