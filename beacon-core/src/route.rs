//! Route-change reinitialization
//!
//! Client-side navigation swaps the DOM without a page load, so the SDK's
//! page-type detection and selector-scoped listeners must be re-run after
//! every navigation.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::context::TrackingContext;
use crate::error::SdkError;

/// What happened on a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReinitOutcome {
    /// `reinit` ran against the new page
    Reinitialized,
    /// Same path as last time; nothing to do
    Unchanged,
    /// Script not loaded yet
    SdkUnavailable,
    /// `reinit` failed; logged and ignored
    Failed(SdkError),
}

/// Calls the SDK `reinit` hook whenever the path changes
pub struct RouteReinitializer {
    context: Arc<TrackingContext>,
    last_path: Mutex<Option<String>>,
}

impl RouteReinitializer {
    pub fn new(context: Arc<TrackingContext>) -> Self {
        Self {
            context,
            last_path: Mutex::new(None),
        }
    }

    /// Notify that navigation to `path` has completed
    pub fn on_navigation(&self, path: &str) -> ReinitOutcome {
        {
            let mut last = self.last_path.lock();
            if last.as_deref() == Some(path) {
                return ReinitOutcome::Unchanged;
            }
            *last = Some(path.to_string());
        }

        let Some(sdk) = self.context.sdk() else {
            debug!(path, "Tracking SDK not loaded; skipping reinit");
            return ReinitOutcome::SdkUnavailable;
        };

        match sdk.reinit() {
            Ok(()) => {
                info!(path, "Tracking SDK reinitialized for route");
                ReinitOutcome::Reinitialized
            }
            Err(e) => {
                error!(path, error = %e, "Failed to reinitialize tracking SDK");
                ReinitOutcome::Failed(e)
            }
        }
    }

    /// The last path seen
    pub fn current_path(&self) -> Option<String> {
        self.last_path.lock().clone()
    }
}
