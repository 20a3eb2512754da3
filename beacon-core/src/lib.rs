//! Beacon Core - readiness-gated interaction tracking for storefront pages
//!
//! Sits between page code and a third-party interaction SDK that loads
//! asynchronously:
//! - Waits (bounded) for the SDK to appear and initialize
//! - Normalizes typed events into the SDK's payload shapes
//! - Drops, never queues, events sent before readiness
//! - Persists visitor consent and forwards it to the SDK
//! - Re-initializes the SDK on client-side navigation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TRACKER                               │
//! │                                                              │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │  │   Consent   │  │    Auth     │  │   Route     │         │
//! │  │   Store     │  │    Flow     │  │   Reinit    │         │
//! │  └─────────────┘  └─────────────┘  └─────────────┘         │
//! │         │                │                │                 │
//! │         └────────────────┼────────────────┘                 │
//! │                          │                                  │
//! │                    ┌─────▼─────┐    ┌─────────────┐        │
//! │                    │ Normalize │───▶│  Dispatcher │        │
//! │                    └───────────┘    └──────┬──────┘        │
//! │                                            │                │
//! │  ┌─────────────────────────────────────────▼─────┐         │
//! │  │      TRACKING CONTEXT (readiness gate)        │         │
//! │  │   SDK handle · consent snapshot · callbacks   │         │
//! │  └───────────────────────────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use beacon_core::{MemoryStorage, Tracker, TrackerConfig};
//!
//! let tracker = Tracker::new(TrackerConfig::default());
//! tracker.bootstrap(&probe).await?;
//!
//! let consent = tracker.consent_store(Arc::new(MemoryStorage::new()));
//! consent.accept_all()?;
//!
//! tracker.track_product_click("PRD001");
//! ```

pub mod auth;
pub mod catalog;
pub mod config;
pub mod consent;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod normalize;
pub mod personalization;
pub mod readiness;
pub mod route;
pub mod sdk;
pub mod tracker;

pub use auth::{
    AuthFlow, AuthMode, AuthProvider, DisplayUser, InMemoryAuthProvider, RegistrationForm, SessionChanges,
};
pub use catalog::{Catalog, Product};
pub use config::{ConsentConfig, PersonalizationConfig, ReadinessConfig, SdkInitConfig, TrackerConfig};
pub use consent::{ConsentPreferences, ConsentStorage, ConsentStore, FileStorage, MemoryStorage};
pub use context::TrackingContext;
pub use dispatch::{DispatchOutcome, DispatchStats, Dispatcher, DropReason, RecentEvent};
pub use error::{AuthError, SdkError, TrackingError, TrackingResult};
pub use event::{AttributeValue, ConsentPurpose, ConsentStatus, TrackingEvent};
pub use normalize::normalize;
pub use personalization::{PersonalizationClient, PersonalizedContent};
pub use readiness::{wait_for_sdk, ReadinessGate};
pub use route::{ReinitOutcome, RouteReinitializer};
pub use sdk::{DelayedProbe, InteractionsSdk, RecordingSdk, SdkProbe};
pub use tracker::{IdentityTraits, Tracker};
