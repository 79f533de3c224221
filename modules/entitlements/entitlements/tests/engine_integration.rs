//! End-to-end tests of the wired engine over the in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use entitlements::config::EntitlementsConfig;
use entitlements::domain::admin::AdminOperations;
use entitlements::domain::cache::EntitlementCache;
use entitlements::domain::listener::{ChangeListener, RecordChangeKind};
use entitlements::domain::ports::{BillingClient, LifecycleSignal};
use entitlements::domain::resolver::StatusResolver;
use entitlements::domain::service::EntitlementsService;
use entitlements::domain::store::RecordStore;
use entitlements::domain::validator::PeriodicValidator;
use entitlements::infra::{AppLifecycle, InMemoryRecordStore, StaticBillingClient};
use entitlements_sdk::{EntitlementsApi, GrantOptions, RevokeOptions, Subject};

struct Engine {
    store: Arc<InMemoryRecordStore>,
    billing: Arc<StaticBillingClient>,
    cache: Arc<EntitlementCache>,
    validator: Arc<PeriodicValidator>,
    listener: Arc<ChangeListener>,
    service: EntitlementsService,
}

fn engine(billing_active: bool) -> Engine {
    let config = EntitlementsConfig {
        validation_interval: Duration::from_secs(3600),
        min_refresh_gap: Duration::from_millis(50),
        ..EntitlementsConfig::default()
    };

    let store = Arc::new(InMemoryRecordStore::new());
    let billing = Arc::new(StaticBillingClient::new(billing_active));
    let billing_dyn: Arc<dyn BillingClient> = billing.clone();

    let record_store = Arc::new(RecordStore::new(store.clone()));
    let resolver = Arc::new(StatusResolver::new(
        record_store.clone(),
        billing_dyn.clone(),
        &config,
    ));
    let cache = Arc::new(EntitlementCache::new(resolver, &config));
    let validator = Arc::new(PeriodicValidator::new(
        record_store.clone(),
        billing_dyn,
        cache.clone(),
        &config,
    ));
    let listener = Arc::new(ChangeListener::new(store.clone(), cache.clone(), &config));
    let admin = AdminOperations::new(record_store, cache.clone());
    let service = EntitlementsService::new(cache.clone(), admin);

    Engine {
        store,
        billing,
        cache,
        validator,
        listener,
        service,
    }
}

#[tokio::test]
async fn grant_then_gate_checks_flip_to_unlimited() {
    let subject = Subject::new("owner@example.com");
    let engine = engine(false);

    let before = engine.service.get_subscription_status(&subject).await;
    assert!(!before.is_premium);

    let company_gate = engine.service.can_create_company(&subject, 1).await;
    assert!(!company_gate.allowed, "free tier allows a single company");

    engine
        .service
        .grant_premium_access(&subject, GrantOptions::default())
        .await
        .unwrap();

    let after = engine.service.get_subscription_status(&subject).await;
    assert!(after.is_premium);
    assert!(engine.service.can_create_company(&subject, 100).await.allowed);
    assert!(
        engine
            .service
            .can_create_transaction(&subject, 1_000_000)
            .await
            .allowed
    );
}

#[tokio::test]
async fn realtime_downgrade_reaches_gating_without_a_tick() {
    let subject = Subject::new("owner@example.com");
    let engine = engine(false);

    engine
        .service
        .grant_premium_access(&subject, GrantOptions::default())
        .await
        .unwrap();
    assert!(
        engine
            .service
            .get_subscription_status(&subject)
            .await
            .is_premium
    );

    let mut changes = engine.listener.subscribe_changes().unwrap();
    engine
        .listener
        .start_listening(subject.clone())
        .await
        .unwrap();

    // A support operator cancels the subscription out-of-band.
    engine
        .service
        .cancel_subscription(&subject, RevokeOptions::default())
        .await
        .unwrap();

    let change = tokio::time::timeout(Duration::from_secs(2), changes.recv())
        .await
        .expect("the cancellation must be pushed to the listener")
        .unwrap();
    assert_eq!(change.kind, RecordChangeKind::ManualDowngrade);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = engine.service.get_subscription_status(&subject).await;
    assert!(!status.is_premium);

    engine.listener.destroy().await;
}

#[tokio::test]
async fn foreground_validation_syncs_purchase_into_the_store() {
    let subject = Subject::new("owner@example.com");
    let engine = engine(true);
    let lifecycle = AppLifecycle::new();
    let mut results = engine.validator.subscribe();

    assert!(engine.store.get(&subject).is_none());

    engine.validator.start(subject.clone());
    let lifecycle_task = engine.validator.bind_lifecycle(lifecycle.subscribe());

    lifecycle.notify_foreground();

    let result = tokio::time::timeout(Duration::from_secs(2), results.recv())
        .await
        .expect("the foreground transition must trigger a pass")
        .unwrap();
    assert!(result.is_valid);
    assert!(result.has_active_subscription);
    assert!(result.synced_with_store);

    let record = engine.store.get(&subject).expect("record synced from billing");
    assert_eq!(record.payment_platform.as_deref(), Some("billing"));

    let status = engine.service.get_subscription_status(&subject).await;
    assert!(status.is_premium);

    lifecycle_task.abort();
    engine.validator.stop().await;
}

#[tokio::test]
async fn billing_expiry_downgrades_only_billing_owned_records() {
    let subject = Subject::new("owner@example.com");
    let engine = engine(true);
    let mut results = engine.validator.subscribe();

    engine.validator.start(subject.clone());

    // First pass: purchase lands in the store.
    engine.validator.run_validation_pass().await;
    let first = results.recv().await.unwrap();
    assert!(first.synced_with_store);

    // Subscription lapses on the billing side.
    engine.billing.set_active(false);
    tokio::time::sleep(Duration::from_millis(60)).await;
    engine.validator.handle_app_foreground().await;

    let second = results.recv().await.unwrap();
    assert!(second.is_valid);
    assert!(second.synced_with_store);

    let status = engine.cache.get_or_resolve(&subject).await;
    assert!(!status.is_premium, "expired billing subscription revokes premium");

    engine.validator.stop().await;
}
