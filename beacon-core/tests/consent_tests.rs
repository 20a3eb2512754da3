//! ConsentStore tests

use std::path::PathBuf;
use std::sync::Arc;

use beacon_core::config::CONSENT_STORAGE_KEY;
use beacon_core::event::ConsentEntry;
use beacon_core::{
    ConsentPreferences, ConsentPurpose, ConsentStatus, ConsentStorage, FileStorage, InteractionsSdk,
    MemoryStorage, RecordingSdk, Tracker, TrackerConfig,
};

fn temp_state_dir() -> PathBuf {
    std::env::temp_dir().join(format!("beacon-consent-{}", uuid::Uuid::new_v4()))
}

async fn ready_tracker() -> (Tracker, Arc<RecordingSdk>) {
    let tracker = Tracker::new(TrackerConfig::default());
    let sdk = Arc::new(RecordingSdk::new());
    let handle: Arc<dyn InteractionsSdk> = sdk.clone();
    tracker.bootstrap(&move || Some(handle.clone())).await.unwrap();
    (tracker, sdk)
}

#[tokio::test]
async fn test_save_then_load_round_trips_through_files() {
    let dir = temp_state_dir();
    let tracker = Tracker::new(TrackerConfig::default());
    let store = tracker.consent_store(Arc::new(FileStorage::new(&dir).unwrap()));

    for (tracking, analytics) in [(true, true), (true, false), (false, true), (false, false)] {
        let preferences = ConsentPreferences::new(tracking, analytics);
        store.save(preferences).unwrap();
        assert_eq!(store.load(), Some(preferences));
    }

    // A second store over the same directory sees the last decision.
    let reopened = Tracker::new(TrackerConfig::default()).consent_store(Arc::new(FileStorage::new(&dir).unwrap()));
    let restored = reopened.restore().unwrap();
    assert!(!restored.tracking);
    assert!(!restored.analytics);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_partial_consent_forwards_two_entries_and_two_events() {
    let (tracker, sdk) = ready_tracker().await;
    let store = tracker.consent_store(Arc::new(MemoryStorage::new()));

    let application = store.customize(true, false).unwrap();

    assert!(application.registry_updated);
    assert_eq!(application.events.len(), 2);
    assert!(application.events.iter().all(|outcome| outcome.is_sent()));

    let entries: Vec<ConsentEntry> = sdk.consent_updates().into_iter().flatten().collect();
    assert_eq!(
        entries,
        vec![
            ConsentEntry::new(ConsentPurpose::Tracking, ConsentStatus::OptIn),
            ConsentEntry::new(ConsentPurpose::Analytics, ConsentStatus::OptOut),
        ]
    );

    let sent = sdk.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["eventType"], "consentLog");
    assert_eq!(sent[0]["purpose"], "Tracking");
    assert_eq!(sent[0]["status"], "OptIn");
    assert_eq!(sent[0]["provider"], "Website");
    assert_eq!(sent[1]["purpose"], "Analytics");
    assert_eq!(sent[1]["status"], "OptOut");
}

#[tokio::test]
async fn test_accept_all_from_fresh_visit() {
    let (tracker, sdk) = ready_tracker().await;
    let storage = Arc::new(MemoryStorage::new());
    let store = tracker.consent_store(storage.clone());

    // Banner shown
    assert!(store.needs_decision());

    let before = chrono::Utc::now().timestamp_millis();
    store.accept_all().unwrap();

    let raw = storage.get(CONSENT_STORAGE_KEY).unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["tracking"], true);
    assert_eq!(stored["analytics"], true);
    assert!(stored["timestamp"].as_i64().unwrap() >= before);

    let updates = sdk.consent_updates();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].iter().all(|entry| entry.status == ConsentStatus::OptIn));
    assert_eq!(updates[0].len(), 2);

    // Banner hidden
    assert!(!store.needs_decision());
}

#[tokio::test]
async fn test_decision_before_readiness_is_applied_on_bootstrap() {
    let tracker = Tracker::new(TrackerConfig::default());
    let store = tracker.consent_store(Arc::new(MemoryStorage::new()));

    let application = store.reject_all().unwrap();
    assert!(application.is_deferred());

    let sdk = Arc::new(RecordingSdk::new());
    let handle: Arc<dyn InteractionsSdk> = sdk.clone();
    tracker.bootstrap(&move || Some(handle.clone())).await.unwrap();

    let updates = sdk.consent_updates();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].iter().all(|entry| entry.status == ConsentStatus::OptOut));
    assert_eq!(sdk.sent().len(), 2);
}

#[tokio::test]
async fn test_clear_shows_banner_again() {
    let (tracker, _sdk) = ready_tracker().await;
    let store = tracker.consent_store(Arc::new(MemoryStorage::new()));

    store.accept_all().unwrap();
    assert!(tracker.context().consent().is_some());

    store.clear().unwrap();
    assert!(store.needs_decision());
    assert!(tracker.context().consent().is_none());
}

#[tokio::test]
async fn test_two_stores_before_readiness_apply_once() {
    let tracker = Tracker::new(TrackerConfig::default());
    let banner = tracker.consent_store(Arc::new(MemoryStorage::new()));
    let settings = tracker.consent_store(Arc::new(MemoryStorage::new()));

    assert!(banner.customize(true, false).unwrap().is_deferred());
    assert!(settings.customize(true, false).unwrap().is_deferred());

    let sdk = Arc::new(RecordingSdk::new());
    let handle: Arc<dyn InteractionsSdk> = sdk.clone();
    tracker.bootstrap(&move || Some(handle.clone())).await.unwrap();

    let updates = sdk.consent_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0],
        vec![
            ConsentEntry::new(ConsentPurpose::Tracking, ConsentStatus::OptIn),
            ConsentEntry::new(ConsentPurpose::Analytics, ConsentStatus::OptOut),
        ]
    );
    assert_eq!(sdk.sent().len(), 2);
}
