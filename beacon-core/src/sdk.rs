//! Boundary to the vendor tracking SDK
//!
//! The SDK is loaded asynchronously from a CDN and is opaque to us. It is
//! modelled as the [`InteractionsSdk`] trait; [`SdkProbe`] answers the
//! question "has the script appeared yet?".

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SdkInitConfig;
use crate::error::{SdkError, SdkResult};
use crate::event::ConsentEntry;

/// Vendor SDK interface
#[async_trait]
pub trait InteractionsSdk: Send + Sync {
    /// Backend name (for logging)
    fn name(&self) -> &str;

    /// Initialize with default consents and debug level
    async fn init(&self, config: &SdkInitConfig) -> SdkResult<()>;

    /// Re-scan the current page after a client-side navigation
    fn reinit(&self) -> SdkResult<()>;

    /// Replace the consent registry entries for the given purposes
    fn update_consents(&self, consents: &[ConsentEntry]) -> SdkResult<()>;

    /// Hand a payload to the SDK; batching and transmission are its business
    fn send_event(&self, payload: &Value) -> SdkResult<()>;

    /// Initialize the personalization module; `false` if it is not loaded
    fn initialize_personalization(&self) -> bool;

    /// Fetch decisions for placements; `Ok(None)` if the module is not loaded
    async fn fetch_personalization(&self, keys: &[String]) -> SdkResult<Option<PersonalizationResponse>>;
}

/// Response of `Personalization.fetch`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalizations: Option<Vec<PersonalizationItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// One personalization decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalization_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalization_point_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalization_point_name: Option<String>,
}

/// Presence check for the asynchronously loaded SDK
pub trait SdkProbe: Send + Sync {
    /// The SDK handle, once the script has loaded
    fn locate(&self) -> Option<Arc<dyn InteractionsSdk>>;
}

impl<F> SdkProbe for F
where
    F: Fn() -> Option<Arc<dyn InteractionsSdk>> + Send + Sync,
{
    fn locate(&self) -> Option<Arc<dyn InteractionsSdk>> {
        self()
    }
}

/// Probe that reports the SDK only after a number of misses
///
/// Simulates a script tag that finishes loading some ticks after start.
pub struct DelayedProbe {
    sdk: Option<Arc<dyn InteractionsSdk>>,
    misses_left: AtomicU32,
    checks: AtomicU32,
}

impl DelayedProbe {
    /// SDK becomes visible on check number `misses + 1`
    pub fn new(sdk: Arc<dyn InteractionsSdk>, misses: u32) -> Self {
        Self {
            sdk: Some(sdk),
            misses_left: AtomicU32::new(misses),
            checks: AtomicU32::new(0),
        }
    }

    /// A script that never loads
    pub fn never() -> Self {
        Self {
            sdk: None,
            misses_left: AtomicU32::new(0),
            checks: AtomicU32::new(0),
        }
    }

    /// Number of presence checks performed so far
    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

impl SdkProbe for DelayedProbe {
    fn locate(&self) -> Option<Arc<dyn InteractionsSdk>> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let missed = self
            .misses_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if missed {
            None
        } else {
            self.sdk.clone()
        }
    }
}

/// In-process SDK that records every call
///
/// Useful for tests and dry runs: nothing leaves the process, and sends,
/// init and reinit can be told to fail.
pub struct RecordingSdk {
    sent: Mutex<Vec<Value>>,
    consent_updates: Mutex<Vec<Vec<ConsentEntry>>>,
    init_calls: Mutex<Vec<SdkInitConfig>>,
    fetches: Mutex<Vec<Vec<String>>>,
    reinit_count: AtomicU64,
    fail_sends: AtomicBool,
    fail_init: AtomicBool,
    fail_reinit: AtomicBool,
    personalization: Mutex<Option<SdkResult<PersonalizationResponse>>>,
}

impl RecordingSdk {
    /// SDK without a personalization module
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            consent_updates: Mutex::new(Vec::new()),
            init_calls: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
            reinit_count: AtomicU64::new(0),
            fail_sends: AtomicBool::new(false),
            fail_init: AtomicBool::new(false),
            fail_reinit: AtomicBool::new(false),
            personalization: Mutex::new(None),
        }
    }

    /// Load a personalization module answering every fetch with `response`
    pub fn with_personalization(self, response: PersonalizationResponse) -> Self {
        *self.personalization.lock() = Some(Ok(response));
        self
    }

    /// Load a personalization module whose fetches fail
    pub fn with_failing_personalization(self, error: SdkError) -> Self {
        *self.personalization.lock() = Some(Err(error));
        self
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reinit(&self, fail: bool) {
        self.fail_reinit.store(fail, Ordering::SeqCst);
    }

    /// Payloads accepted by `send_event`
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// Calls made to `update_consents`
    pub fn consent_updates(&self) -> Vec<Vec<ConsentEntry>> {
        self.consent_updates.lock().clone()
    }

    /// Configs passed to `init`
    pub fn init_calls(&self) -> Vec<SdkInitConfig> {
        self.init_calls.lock().clone()
    }

    /// Keys passed to `fetch_personalization`
    pub fn fetches(&self) -> Vec<Vec<String>> {
        self.fetches.lock().clone()
    }

    pub fn reinit_count(&self) -> u64 {
        self.reinit_count.load(Ordering::SeqCst)
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.sent.lock().clear();
        self.consent_updates.lock().clear();
        self.init_calls.lock().clear();
        self.fetches.lock().clear();
        self.reinit_count.store(0, Ordering::SeqCst);
    }
}

impl Default for RecordingSdk {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InteractionsSdk for RecordingSdk {
    fn name(&self) -> &str {
        "recording"
    }

    async fn init(&self, config: &SdkInitConfig) -> SdkResult<()> {
        self.init_calls.lock().push(config.clone());
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(SdkError::Rejected("init refused".to_string()));
        }
        Ok(())
    }

    fn reinit(&self) -> SdkResult<()> {
        if self.fail_reinit.load(Ordering::SeqCst) {
            return Err(SdkError::Rejected("reinit refused".to_string()));
        }
        self.reinit_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn update_consents(&self, consents: &[ConsentEntry]) -> SdkResult<()> {
        self.consent_updates.lock().push(consents.to_vec());
        Ok(())
    }

    fn send_event(&self, payload: &Value) -> SdkResult<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SdkError::Transport("beacon endpoint unreachable".to_string()));
        }
        self.sent.lock().push(payload.clone());
        Ok(())
    }

    fn initialize_personalization(&self) -> bool {
        self.personalization.lock().is_some()
    }

    async fn fetch_personalization(&self, keys: &[String]) -> SdkResult<Option<PersonalizationResponse>> {
        self.fetches.lock().push(keys.to_vec());
        let module = self.personalization.lock().clone();
        match module {
            None => Ok(None),
            Some(Ok(response)) => Ok(Some(response)),
            Some(Err(e)) => Err(e),
        }
    }
}
