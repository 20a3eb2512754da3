//! Tracker facade
//!
//! The entry point UI code talks to. It owns the tracking context, runs the
//! startup sequence, applies the consent gate and exposes one `track_*`
//! helper per intent.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use crate::catalog::Catalog;
use crate::config::TrackerConfig;
use crate::consent::{ConsentStorage, ConsentStore};
use crate::context::TrackingContext;
use crate::dispatch::{DispatchOutcome, DispatchStats, Dispatcher, DropReason};
use crate::error::{TrackingError, TrackingResult};
use crate::event::{AttributeValue, ConsentStatus, TrackingEvent};
use crate::personalization::PersonalizationClient;
use crate::readiness::wait_for_sdk;
use crate::route::RouteReinitializer;
use crate::sdk::SdkProbe;

/// Optional profile fields of an identity event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityTraits {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Tracking entry point for the page
pub struct Tracker {
    config: TrackerConfig,
    context: Arc<TrackingContext>,
    dispatcher: Dispatcher,
    catalog: Catalog,
    anonymous_scheduled: AtomicBool,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        let context = TrackingContext::shared();
        Self {
            config,
            dispatcher: Dispatcher::new(context.clone()),
            context,
            catalog: Catalog::default(),
            anonymous_scheduled: AtomicBool::new(false),
        }
    }

    /// Replace the default product catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<TrackingContext> {
        &self.context
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_ready()
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Debug-panel test interaction; not subject to the consent gate
    pub fn send_test_event(&self) -> DispatchOutcome {
        self.dispatcher.send_test_event()
    }

    pub fn clear_recent_events(&self) {
        self.dispatcher.clear_recent();
    }

    /// Wait for the SDK script, initialize it and open the readiness gate
    ///
    /// Failures are logged here; the returned error is informational and
    /// the page keeps working without tracking.
    pub async fn bootstrap(&self, probe: &dyn SdkProbe) -> TrackingResult<()> {
        let sdk = match wait_for_sdk(probe, &self.config.readiness).await {
            Ok(sdk) => sdk,
            Err(e) => {
                error!(error = %e, "Tracking disabled");
                return Err(e);
            }
        };
        self.context.install_sdk(sdk.clone());

        if sdk.initialize_personalization() {
            info!("Personalization module initialized");
        } else {
            info!("Personalization module not present in beacon");
        }

        if let Err(e) = sdk.init(&self.config.sdk).await {
            error!(error = %e, "Tracking SDK initialization failed");
            return Err(TrackingError::InitFailed(e));
        }

        self.context.readiness().mark_ready();
        info!(sdk = sdk.name(), "Tracking SDK initialized");
        Ok(())
    }

    /// Consent store sharing this tracker's context
    pub fn consent_store(&self, storage: Arc<dyn ConsentStorage>) -> ConsentStore {
        ConsentStore::new(storage, self.dispatcher.clone(), self.config.consent.clone())
    }

    /// Route reinitializer sharing this tracker's context
    pub fn route_reinitializer(&self) -> RouteReinitializer {
        RouteReinitializer::new(self.context.clone())
    }

    /// Personalization client sharing this tracker's context
    pub fn personalization(&self) -> PersonalizationClient {
        PersonalizationClient::new(self.context.clone(), self.config.personalization.clone())
    }

    /// Dispatch an event through the consent gate
    pub fn track(&self, event: &TrackingEvent) -> DispatchOutcome {
        if self.config.consent.enforce_gate && !event.is_consent_exempt() {
            match self.context.consent() {
                None => return self.dispatcher.drop_event(event, DropReason::ConsentPending),
                Some(preferences) if !preferences.tracking => {
                    return self.dispatcher.drop_event(event, DropReason::ConsentWithheld)
                }
                Some(_) => {}
            }
        }
        self.dispatcher.dispatch(event)
    }

    /// Generic named interaction
    pub fn track_event(&self, name: &str, additional: BTreeMap<String, AttributeValue>) -> DispatchOutcome {
        self.track(&TrackingEvent::GenericInteraction {
            interaction_name: name.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            additional,
        })
    }

    pub fn track_identity(&self, is_anonymous: bool, traits: IdentityTraits) -> DispatchOutcome {
        self.track(&TrackingEvent::Identity {
            is_anonymous,
            first_name: traits.first_name,
            last_name: traits.last_name,
            email: traits.email,
            phone_number: traits.phone_number,
        })
    }

    pub fn track_email(&self, email: &str) -> DispatchOutcome {
        self.track(&TrackingEvent::ContactPointEmail {
            email: email.to_string(),
        })
    }

    pub fn track_user_id(&self, user_id: &str, id_type: &str, id_name: &str) -> DispatchOutcome {
        self.track(&TrackingEvent::PartyIdentification {
            user_id: user_id.to_string(),
            id_type: id_type.to_string(),
            id_name: id_name.to_string(),
        })
    }

    pub fn track_consent(&self, purpose: &str, status: ConsentStatus, provider: Option<&str>) -> DispatchOutcome {
        self.track(&TrackingEvent::Consent {
            purpose: purpose.to_string(),
            status,
            provider: provider.map(str::to_string),
        })
    }

    /// Product card click; unknown products are ignored
    pub fn track_product_click(&self, product_id: &str) -> Option<DispatchOutcome> {
        let product = self.catalog.get(product_id)?;
        Some(self.track(&product.click_event()))
    }

    /// Send the anonymous identity once per page, as soon as the SDK is ready
    ///
    /// Returns `false` if it was already scheduled or sent.
    pub fn track_anonymous_once(&self) -> bool {
        if self.anonymous_scheduled.swap(true, Ordering::SeqCst) {
            return false;
        }
        let dispatcher = self.dispatcher.clone();
        self.context.readiness().on_ready(move || {
            dispatcher.dispatch(&TrackingEvent::anonymous_identity());
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::ConsentPreferences;
    use crate::sdk::{InteractionsSdk, RecordingSdk};

    async fn ready_tracker(config: TrackerConfig) -> (Tracker, Arc<RecordingSdk>) {
        let tracker = Tracker::new(config);
        let sdk = Arc::new(RecordingSdk::new());
        let handle: Arc<dyn InteractionsSdk> = sdk.clone();
        tracker.bootstrap(&move || Some(handle.clone())).await.unwrap();
        (tracker, sdk)
    }

    #[tokio::test]
    async fn gate_drops_until_decision() {
        let (tracker, sdk) = ready_tracker(TrackerConfig::default()).await;

        assert_eq!(
            tracker.track_email("a@b.co"),
            DispatchOutcome::Dropped(DropReason::ConsentPending)
        );

        tracker.context().publish_consent(Some(ConsentPreferences::new(false, true)));
        assert_eq!(
            tracker.track_email("a@b.co"),
            DispatchOutcome::Dropped(DropReason::ConsentWithheld)
        );

        tracker.context().publish_consent(Some(ConsentPreferences::new(true, false)));
        assert!(tracker.track_email("a@b.co").is_sent());
        assert_eq!(sdk.sent().len(), 1);
    }

    #[tokio::test]
    async fn exempt_events_pass_the_gate() {
        let (tracker, sdk) = ready_tracker(TrackerConfig::default()).await;

        assert!(tracker.track_identity(true, IdentityTraits::default()).is_sent());
        assert!(tracker
            .track_consent("Tracking", ConsentStatus::OptOut, Some("Website"))
            .is_sent());
        assert_eq!(sdk.sent().len(), 2);
    }

    #[tokio::test]
    async fn gate_can_be_disabled() {
        let mut config = TrackerConfig::default();
        config.consent.enforce_gate = false;
        let (tracker, _) = ready_tracker(config).await;

        assert!(tracker.track_event("user_login", BTreeMap::new()).is_sent());
    }

    #[tokio::test]
    async fn unknown_product_click_is_ignored() {
        let (tracker, sdk) = ready_tracker(TrackerConfig::default()).await;
        assert_eq!(tracker.track_product_click("PRD404"), None);
        assert!(sdk.sent().is_empty());
    }

    #[tokio::test]
    async fn anonymous_identity_waits_for_readiness_and_sends_once() {
        let tracker = Tracker::new(TrackerConfig::default());
        let sdk = Arc::new(RecordingSdk::new());

        assert!(tracker.track_anonymous_once());
        assert!(!tracker.track_anonymous_once());
        assert!(sdk.sent().is_empty());

        let handle: Arc<dyn InteractionsSdk> = sdk.clone();
        tracker.bootstrap(&move || Some(handle.clone())).await.unwrap();

        assert_eq!(sdk.sent().len(), 1);
        assert_eq!(sdk.sent()[0]["user"]["attributes"]["isAnonymous"], 1);
        assert!(!tracker.track_anonymous_once());
    }

    #[tokio::test]
    async fn failed_init_keeps_gate_closed() {
        let tracker = Tracker::new(TrackerConfig::default());
        let sdk = Arc::new(RecordingSdk::new());
        sdk.set_fail_init(true);
        let handle: Arc<dyn InteractionsSdk> = sdk.clone();

        let err = tracker.bootstrap(&move || Some(handle.clone())).await.err().unwrap();

        assert!(matches!(err, TrackingError::InitFailed(_)));
        assert!(!tracker.is_ready());
        assert_eq!(sdk.init_calls().len(), 1);
    }
}
