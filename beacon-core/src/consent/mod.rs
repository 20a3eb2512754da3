//! Consent store
//!
//! Persists the visitor's tracking/analytics choice and re-applies it to
//! the SDK consent registry. Every save replaces the previous decision
//! wholesale; there is no per-purpose withdrawal.
//!
//! Applying a decision does two things:
//! - forwards `[Tracking, Analytics]` statuses to `update_consents`
//! - dispatches one Consent event per purpose so the choice is logged
//!   server-side

pub mod storage;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ConsentConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::TrackingResult;
use crate::event::{ConsentEntry, ConsentPurpose, ConsentStatus, TrackingEvent};

pub use storage::{ConsentStorage, FileStorage, MemoryStorage};

/// The visitor's consent decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentPreferences {
    pub tracking: bool,
    pub analytics: bool,
    /// Epoch milliseconds of the decision
    pub timestamp: i64,
}

impl ConsentPreferences {
    /// A decision made now
    pub fn new(tracking: bool, analytics: bool) -> Self {
        Self {
            tracking,
            analytics,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn allows(&self, purpose: ConsentPurpose) -> bool {
        match purpose {
            ConsentPurpose::Tracking => self.tracking,
            ConsentPurpose::Analytics => self.analytics,
        }
    }

    pub fn status(&self, purpose: ConsentPurpose) -> ConsentStatus {
        ConsentStatus::from_opt_in(self.allows(purpose))
    }

    /// Registry entries, one per managed purpose
    pub fn entries(&self) -> Vec<ConsentEntry> {
        ConsentPurpose::ALL
            .iter()
            .map(|purpose| ConsentEntry::new(*purpose, self.status(*purpose)))
            .collect()
    }
}

/// Result of applying a decision to the SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentApplication {
    /// Whether `update_consents` accepted the entries
    pub registry_updated: bool,

    /// One outcome per Consent event, in purpose order
    pub events: Vec<DispatchOutcome>,
}

impl ConsentApplication {
    fn deferred() -> Self {
        Self {
            registry_updated: false,
            events: Vec::new(),
        }
    }

    /// `true` if the SDK was not ready and forwarding was postponed
    pub fn is_deferred(&self) -> bool {
        !self.registry_updated && self.events.is_empty()
    }
}

/// Loads, saves and applies consent preferences
///
/// A decision made before the SDK is ready is applied once the readiness
/// gate opens, using whichever decision is current at that moment.
#[derive(Clone)]
pub struct ConsentStore {
    storage: Arc<dyn ConsentStorage>,
    dispatcher: Dispatcher,
    config: ConsentConfig,
}

impl ConsentStore {
    pub fn new(storage: Arc<dyn ConsentStorage>, dispatcher: Dispatcher, config: ConsentConfig) -> Self {
        Self {
            storage,
            dispatcher,
            config,
        }
    }

    /// Read the stored decision
    ///
    /// Unreadable or corrupt entries are logged and treated as absent, so
    /// the visitor is asked again.
    pub fn load(&self) -> Option<ConsentPreferences> {
        let raw = match self.storage.get(&self.config.storage_key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(backend = self.storage.name(), error = %e, "Failed to read stored consent");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(preferences) => Some(preferences),
            Err(e) => {
                warn!(error = %e, "Ignoring corrupt stored consent");
                None
            }
        }
    }

    /// Whether the banner must be shown
    pub fn needs_decision(&self) -> bool {
        self.load().is_none()
    }

    /// Persist a decision, replacing any previous one, then apply it
    pub fn save(&self, preferences: ConsentPreferences) -> TrackingResult<ConsentApplication> {
        let raw = serde_json::to_string(&preferences)?;
        self.storage.set(&self.config.storage_key, &raw)?;
        self.dispatcher.context().publish_consent(Some(preferences));
        info!(
            tracking = preferences.tracking,
            analytics = preferences.analytics,
            "Consent saved"
        );
        Ok(self.apply(&preferences))
    }

    pub fn accept_all(&self) -> TrackingResult<ConsentApplication> {
        self.save(ConsentPreferences::new(true, true))
    }

    pub fn reject_all(&self) -> TrackingResult<ConsentApplication> {
        self.save(ConsentPreferences::new(false, false))
    }

    pub fn customize(&self, tracking: bool, analytics: bool) -> TrackingResult<ConsentApplication> {
        self.save(ConsentPreferences::new(tracking, analytics))
    }

    /// Re-apply the stored decision on a new page load
    pub fn restore(&self) -> Option<ConsentPreferences> {
        let preferences = self.load();
        self.dispatcher.context().publish_consent(preferences);
        if let Some(preferences) = &preferences {
            self.apply(preferences);
        }
        preferences
    }

    /// Forget the stored decision
    pub fn clear(&self) -> TrackingResult<()> {
        self.storage.remove(&self.config.storage_key)?;
        self.dispatcher.context().publish_consent(None);
        Ok(())
    }

    fn apply(&self, preferences: &ConsentPreferences) -> ConsentApplication {
        if self.dispatcher.context().ready_sdk().is_none() {
            self.defer_until_ready();
            return ConsentApplication::deferred();
        }
        self.apply_now(preferences)
    }

    fn defer_until_ready(&self) {
        // One callback per context, however many stores share it.
        if !self.dispatcher.context().claim_consent_apply() {
            return;
        }
        debug!("Tracking SDK not ready; consent will be applied once it is");
        let store = self.clone();
        self.dispatcher.context().readiness().on_ready(move || {
            store.dispatcher.context().release_consent_apply();
            if let Some(current) = store.dispatcher.context().consent() {
                store.apply_now(&current);
            }
        });
    }

    fn apply_now(&self, preferences: &ConsentPreferences) -> ConsentApplication {
        let Some(sdk) = self.dispatcher.context().ready_sdk() else {
            return ConsentApplication::deferred();
        };

        let entries = preferences.entries();
        let registry_updated = match sdk.update_consents(&entries) {
            Ok(()) => {
                info!(?entries, "Consent registry updated");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to update consent registry");
                false
            }
        };

        let events = entries
            .into_iter()
            .map(|entry| {
                self.dispatcher.dispatch(&TrackingEvent::Consent {
                    purpose: entry.purpose,
                    status: entry.status,
                    provider: Some(self.config.provider.clone()),
                })
            })
            .collect();

        ConsentApplication {
            registry_updated,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TrackingContext;
    use crate::sdk::RecordingSdk;

    fn store_with(storage: Arc<MemoryStorage>) -> (ConsentStore, Arc<TrackingContext>) {
        let context = TrackingContext::shared();
        let dispatcher = Dispatcher::new(context.clone());
        (ConsentStore::new(storage, dispatcher, ConsentConfig::default()), context)
    }

    #[test]
    fn entries_follow_flags() {
        let preferences = ConsentPreferences {
            tracking: true,
            analytics: false,
            timestamp: 1,
        };
        assert_eq!(
            preferences.entries(),
            vec![
                ConsentEntry::new(ConsentPurpose::Tracking, ConsentStatus::OptIn),
                ConsentEntry::new(ConsentPurpose::Analytics, ConsentStatus::OptOut),
            ]
        );
    }

    #[test]
    fn stored_json_uses_plain_field_names() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store_with(storage.clone());
        store
            .save(ConsentPreferences {
                tracking: true,
                analytics: false,
                timestamp: 1_700_000_000_000,
            })
            .unwrap();

        let raw = storage.get("sf_user_consent").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"tracking": true, "analytics": false, "timestamp": 1_700_000_000_000i64})
        );
    }

    #[test]
    fn save_before_ready_is_deferred_but_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, context) = store_with(storage);
        let sdk = Arc::new(RecordingSdk::new());
        context.install_sdk(sdk.clone());

        let applied = store.accept_all().unwrap();

        assert!(applied.is_deferred());
        assert!(sdk.consent_updates().is_empty());
        assert!(store.load().unwrap().tracking);
        assert_eq!(context.consent().map(|p| p.analytics), Some(true));
    }

    #[test]
    fn deferred_decision_applies_latest_when_gate_opens() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, context) = store_with(storage);
        let sdk = Arc::new(RecordingSdk::new());
        context.install_sdk(sdk.clone());

        store.reject_all().unwrap();
        store.accept_all().unwrap();
        assert!(sdk.consent_updates().is_empty());

        context.readiness().mark_ready();

        let updates = sdk.consent_updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].iter().all(|entry| entry.status == ConsentStatus::OptIn));
        assert_eq!(sdk.sent().len(), 2);
    }

    #[test]
    fn stores_sharing_a_context_defer_one_apply() {
        let context = TrackingContext::shared();
        let dispatcher = Dispatcher::new(context.clone());
        let first = ConsentStore::new(Arc::new(MemoryStorage::new()), dispatcher.clone(), ConsentConfig::default());
        let second = ConsentStore::new(Arc::new(MemoryStorage::new()), dispatcher, ConsentConfig::default());
        let sdk = Arc::new(RecordingSdk::new());
        context.install_sdk(sdk.clone());

        first.customize(true, false).unwrap();
        second.customize(true, false).unwrap();
        context.readiness().mark_ready();

        assert_eq!(sdk.consent_updates().len(), 1);
        assert_eq!(sdk.sent().len(), 2);
    }

    #[test]
    fn corrupt_entry_reads_as_absent() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("sf_user_consent", "{not json").unwrap();
        let (store, _) = store_with(storage);

        assert_eq!(store.load(), None);
        assert!(store.needs_decision());
    }

    #[test]
    fn restore_applies_silently_once_ready() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set("sf_user_consent", r#"{"tracking":false,"analytics":true,"timestamp":5}"#)
            .unwrap();
        let (store, context) = store_with(storage);
        let sdk = Arc::new(RecordingSdk::new());
        context.install_sdk(sdk.clone());
        context.readiness().mark_ready();

        let restored = store.restore().unwrap();

        assert!(!restored.tracking);
        assert_eq!(sdk.consent_updates().len(), 1);
        assert_eq!(sdk.sent().len(), 2);
        assert_eq!(sdk.sent()[0]["status"], "OptOut");
        assert_eq!(sdk.sent()[1]["status"], "OptIn");
    }

    #[test]
    fn clear_forgets_decision() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, context) = store_with(storage);
        store.reject_all().unwrap();
        assert!(!store.needs_decision());

        store.clear().unwrap();
        assert!(store.needs_decision());
        assert_eq!(context.consent(), None);
    }

    #[test]
    fn customize_without_sdk_forwards_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store_with(storage);
        let applied = store.customize(true, false).unwrap();
        assert!(applied.is_deferred());
        assert!(applied.events.is_empty());
    }
}
