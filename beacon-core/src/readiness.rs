//! SDK readiness gate
//!
//! The tracking script loads asynchronously, so nothing may be sent until
//! it has been found *and* its `init` has resolved. The gate holds that
//! single monotonic flag and a one-shot notification for anyone waiting.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::config::ReadinessConfig;
use crate::error::{TrackingError, TrackingResult};
use crate::sdk::{InteractionsSdk, SdkProbe};

type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Process-wide readiness flag with a one-shot notification
pub struct ReadinessGate {
    state: watch::Sender<bool>,
    pending: Mutex<Vec<ReadyCallback>>,
}

impl ReadinessGate {
    /// A gate that is not ready yet
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Whether the SDK has finished initializing
    pub fn is_ready(&self) -> bool {
        *self.state.borrow()
    }

    /// Run `callback` exactly once: now if ready, otherwise on the transition
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if self.is_ready() {
            drop(pending);
            callback();
            return;
        }
        pending.push(Box::new(callback));
    }

    /// Wait until the gate opens
    pub async fn wait_ready(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Open the gate; returns `false` if it was already open
    pub(crate) fn mark_ready(&self) -> bool {
        let callbacks = {
            let mut pending = self.pending.lock();
            let opened = self.state.send_if_modified(|ready| {
                if *ready {
                    false
                } else {
                    *ready = true;
                    true
                }
            });
            if !opened {
                return false;
            }
            std::mem::take(&mut *pending)
        };

        debug!(waiting = callbacks.len(), "Readiness gate opened");
        for callback in callbacks {
            callback();
        }
        true
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the SDK script to appear
///
/// Checks once immediately, then once per `poll_interval` for at most
/// `max_attempts` further checks. Dropping the future cancels the poll.
pub async fn wait_for_sdk(
    probe: &dyn SdkProbe,
    config: &ReadinessConfig,
) -> TrackingResult<Arc<dyn InteractionsSdk>> {
    if let Some(sdk) = probe.locate() {
        return Ok(sdk);
    }

    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.poll_interval()).await;
        if let Some(sdk) = probe.locate() {
            debug!(attempt, sdk = sdk.name(), "Tracking SDK became available");
            return Ok(sdk);
        }
    }

    debug!(attempts = config.max_attempts, "Tracking SDK never became available");
    Err(TrackingError::SdkUnavailable {
        attempts: config.max_attempts,
    })
}
