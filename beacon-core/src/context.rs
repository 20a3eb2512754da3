//! Shared tracking context
//!
//! Owns the state every component reads: the readiness gate, the SDK
//! handle once the script has loaded, and the current consent decision.
//! Writers are restricted: only the bootstrap sequence installs the SDK and
//! opens the gate, and only the consent store publishes preferences.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::consent::ConsentPreferences;
use crate::readiness::ReadinessGate;
use crate::sdk::InteractionsSdk;

/// State shared by the dispatcher, consent store and route reinitializer
pub struct TrackingContext {
    readiness: ReadinessGate,
    sdk: RwLock<Option<Arc<dyn InteractionsSdk>>>,
    consent: RwLock<Option<ConsentPreferences>>,
    consent_apply_pending: AtomicBool,
}

impl TrackingContext {
    pub fn new() -> Self {
        Self {
            readiness: ReadinessGate::new(),
            sdk: RwLock::new(None),
            consent: RwLock::new(None),
            consent_apply_pending: AtomicBool::new(false),
        }
    }

    /// Create a context ready to be shared between components
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn readiness(&self) -> &ReadinessGate {
        &self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// The SDK handle, if the script has been found
    pub fn sdk(&self) -> Option<Arc<dyn InteractionsSdk>> {
        self.sdk.read().clone()
    }

    /// The SDK handle, only once initialization has completed
    pub fn ready_sdk(&self) -> Option<Arc<dyn InteractionsSdk>> {
        if self.is_ready() {
            self.sdk()
        } else {
            None
        }
    }

    /// Current consent decision, `None` until the visitor has chosen
    pub fn consent(&self) -> Option<ConsentPreferences> {
        *self.consent.read()
    }

    pub(crate) fn install_sdk(&self, sdk: Arc<dyn InteractionsSdk>) {
        *self.sdk.write() = Some(sdk);
    }

    pub(crate) fn publish_consent(&self, preferences: Option<ConsentPreferences>) {
        *self.consent.write() = preferences;
    }

    /// Claim the single deferred consent apply; `false` if one is already queued
    pub(crate) fn claim_consent_apply(&self) -> bool {
        !self.consent_apply_pending.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn release_consent_apply(&self) {
        self.consent_apply_pending.store(false, Ordering::SeqCst);
    }
}

impl Default for TrackingContext {
    fn default() -> Self {
        Self::new()
    }
}
