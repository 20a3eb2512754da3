//! PersonalizationClient tests

use std::collections::HashMap;
use std::sync::Arc;

use beacon_core::sdk::{PersonalizationItem, PersonalizationResponse};
use beacon_core::{InteractionsSdk, RecordingSdk, SdkError, Tracker, TrackerConfig};

async fn tracker_with(sdk: Arc<RecordingSdk>) -> Tracker {
    let tracker = Tracker::new(TrackerConfig::default());
    let handle: Arc<dyn InteractionsSdk> = sdk;
    tracker.bootstrap(&move || Some(handle.clone())).await.unwrap();
    tracker
}

#[tokio::test]
async fn test_response_without_personalizations_shows_default_hero() {
    let sdk = Arc::new(RecordingSdk::new().with_personalization(PersonalizationResponse {
        personalizations: None,
        request_id: Some("req-1".to_string()),
    }));
    let tracker = tracker_with(sdk.clone()).await;

    let content = tracker.personalization().hero_content().await;

    assert!(content.is_default());
    assert_eq!(content.cta_text, None);
    assert_eq!(content.image_url, None);
    assert_eq!(sdk.fetches(), vec![vec!["special_content".to_string()]]);
}

#[tokio::test]
async fn test_hero_content_reads_first_decision() {
    let mut attributes = HashMap::new();
    attributes.insert("CTA_Text".to_string(), "Shop the drop".to_string());
    attributes.insert("Product_Image_URL".to_string(), "https://img/hero.jpg".to_string());

    let sdk = Arc::new(RecordingSdk::new().with_personalization(PersonalizationResponse {
        personalizations: Some(vec![PersonalizationItem {
            attributes: Some(attributes),
            personalization_point_name: Some("special_content".to_string()),
            ..Default::default()
        }]),
        request_id: None,
    }));
    let tracker = tracker_with(sdk).await;

    let content = tracker.personalization().hero_content().await;

    assert_eq!(content.cta_text.as_deref(), Some("Shop the drop"));
    assert_eq!(content.image_url.as_deref(), Some("https://img/hero.jpg"));
}

#[tokio::test]
async fn test_hero_content_waits_for_bootstrap() {
    let tracker = Arc::new(Tracker::new(TrackerConfig::default()));
    let client = tracker.personalization();
    let pending = tokio::spawn(async move { client.hero_content().await });
    tokio::task::yield_now().await;
    assert!(!pending.is_finished());

    let sdk = Arc::new(RecordingSdk::new().with_personalization(PersonalizationResponse::default()));
    let handle: Arc<dyn InteractionsSdk> = sdk.clone();
    tracker.bootstrap(&move || Some(handle.clone())).await.unwrap();

    let content = pending.await.unwrap();
    assert!(content.is_default());
    assert_eq!(sdk.fetches().len(), 1);
}

#[tokio::test]
async fn test_missing_module_and_failed_fetch_fall_back() {
    let tracker = tracker_with(Arc::new(RecordingSdk::new())).await;
    assert!(tracker.personalization().fetch_now().await.is_default());

    let failing = Arc::new(
        RecordingSdk::new().with_failing_personalization(SdkError::Transport("timeout".to_string())),
    );
    let tracker = tracker_with(failing.clone()).await;
    assert!(tracker.personalization().fetch_now().await.is_default());
    assert_eq!(failing.fetches().len(), 1);
}

#[tokio::test]
async fn test_fetch_before_readiness_skips_sdk() {
    let tracker = Tracker::new(TrackerConfig::default());
    assert!(tracker.personalization().fetch_now().await.is_default());
}
