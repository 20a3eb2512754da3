//! Readiness-gated dispatch to the SDK
//!
//! Fire-and-forget: [`Dispatcher::dispatch`] never fails from the caller's
//! point of view. Events raised before the SDK is ready are dropped, not
//! queued, and send failures are logged and counted, never retried.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::context::TrackingContext;
use crate::error::SdkError;
use crate::event::TrackingEvent;
use crate::normalize::normalize;
use crate::sdk::InteractionsSdk;

/// What happened to a dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handed to the SDK
    Sent,
    /// Deliberately not sent
    Dropped(DropReason),
    /// The SDK refused it; already logged
    Failed(SdkError),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

/// Why an event was dropped before reaching the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// SDK found but `init` has not resolved
    NotReady,
    /// SDK script not loaded
    SdkUnavailable,
    /// Visitor has not made a consent decision yet
    ConsentPending,
    /// Visitor opted out of tracking
    ConsentWithheld,
}

/// Number of sent or failed events kept in [`DispatchStats::recent`]
pub const RECENT_EVENTS: usize = 10;

/// A send attempt that reached the SDK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEvent {
    pub at: DateTime<Utc>,
    pub kind: String,
    /// Event label, or the error for a failed send
    pub message: String,
    pub success: bool,
}

/// Dispatch statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Events handed to the SDK
    pub sent: u64,

    /// Events dropped at the gate
    pub dropped: u64,

    /// Events the SDK refused
    pub failed: u64,

    /// Most recent send failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,

    /// When the most recent send failure happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,

    /// Latest send attempts, newest first
    pub recent: Vec<RecentEvent>,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    last_failure: Mutex<Option<(String, DateTime<Utc>)>>,
    recent: Mutex<VecDeque<RecentEvent>>,
}

impl Counters {
    fn remember(&self, kind: &str, message: String, success: bool) {
        let mut recent = self.recent.lock();
        recent.push_front(RecentEvent {
            at: Utc::now(),
            kind: kind.to_string(),
            message,
            success,
        });
        recent.truncate(RECENT_EVENTS);
    }
}

/// Gate, normalize and send
#[derive(Clone)]
pub struct Dispatcher {
    context: Arc<TrackingContext>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(context: Arc<TrackingContext>) -> Self {
        Self {
            context,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn context(&self) -> &Arc<TrackingContext> {
        &self.context
    }

    /// Send an event if the SDK is ready
    pub fn dispatch(&self, event: &TrackingEvent) -> DispatchOutcome {
        if !self.context.is_ready() {
            let reason = if self.context.sdk().is_some() {
                DropReason::NotReady
            } else {
                DropReason::SdkUnavailable
            };
            return self.drop_event(event, reason);
        }
        let Some(sdk) = self.context.sdk() else {
            return self.drop_event(event, DropReason::SdkUnavailable);
        };

        self.send(&*sdk, event.kind(), event.kind().to_string(), &normalize(event))
    }

    /// Send a `test_event_<ms>` debug interaction, bypassing normalization
    pub fn send_test_event(&self) -> DispatchOutcome {
        let Some(sdk) = self.context.ready_sdk() else {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            debug!("Test event dropped; tracking SDK not ready");
            return DispatchOutcome::Dropped(DropReason::NotReady);
        };

        let name = format!("test_event_{}", Utc::now().timestamp_millis());
        let payload = json!({
            "interaction": {
                "eventType": "website",
                "category": "Debug",
                "name": name,
            }
        });
        self.send(&*sdk, "debug", name, &payload)
    }

    fn send(&self, sdk: &dyn InteractionsSdk, kind: &str, label: String, payload: &Value) -> DispatchOutcome {
        match sdk.send_event(payload) {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::SeqCst);
                self.counters.remember(kind, label, true);
                info!(kind, payload = %payload, "Tracking event sent");
                DispatchOutcome::Sent
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                *self.counters.last_failure.lock() = Some((e.to_string(), Utc::now()));
                self.counters.remember(kind, format!("Error: {}", e), false);
                error!(kind, error = %e, "Failed to send tracking event");
                DispatchOutcome::Failed(e)
            }
        }
    }

    /// Forget the recent-events list; counters are kept
    pub fn clear_recent(&self) {
        self.counters.recent.lock().clear();
    }

    /// Record an event dropped before reaching the SDK
    pub(crate) fn drop_event(&self, event: &TrackingEvent, reason: DropReason) -> DispatchOutcome {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        debug!(kind = event.kind(), ?reason, "Tracking event dropped");
        DispatchOutcome::Dropped(reason)
    }

    pub fn stats(&self) -> DispatchStats {
        let last_failure = self.counters.last_failure.lock().clone();
        DispatchStats {
            sent: self.counters.sent.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            last_failure_at: last_failure.as_ref().map(|(_, at)| *at),
            last_failure: last_failure.map(|(message, _)| message),
            recent: self.counters.recent.lock().iter().cloned().collect(),
        }
    }
}
