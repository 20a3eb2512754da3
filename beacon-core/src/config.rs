//! Configuration for Beacon

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TrackingError, TrackingResult};
use crate::event::{ConsentEntry, ConsentPurpose, ConsentStatus};

/// Storage key the consent preferences are persisted under
pub const CONSENT_STORAGE_KEY: &str = "sf_user_consent";

/// Main tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// SDK readiness polling
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// SDK initialization
    #[serde(default)]
    pub sdk: SdkInitConfig,

    /// Consent handling
    #[serde(default)]
    pub consent: ConsentConfig,

    /// Personalized hero block
    #[serde(default)]
    pub personalization: PersonalizationConfig,

    /// Identity mapping for authenticated users
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl TrackerConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn from_json_file(path: impl AsRef<Path>) -> TrackingResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: TrackerConfig = serde_json::from_str(&raw)?;
        config.with_env_overrides()
    }

    /// Apply `BEACON_*` environment overrides
    pub fn with_env_overrides(mut self) -> TrackingResult<Self> {
        if let Some(interval) = env_number::<u64>("BEACON_POLL_INTERVAL_MS")? {
            self.readiness.poll_interval_ms = interval;
        }
        if let Some(attempts) = env_number::<u32>("BEACON_MAX_ATTEMPTS")? {
            self.readiness.max_attempts = attempts;
        }
        if let Some(level) = env_number::<u8>("BEACON_LOG_LEVEL")? {
            self.sdk.debug.log_level = level;
        }
        Ok(self)
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> TrackingResult<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TrackingError::Config(format!("{} is not a valid number: {:?}", name, value))),
        Err(_) => Ok(None),
    }
}

/// Readiness polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Interval between presence checks in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum number of ticks before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 { 50 }
fn default_max_attempts() -> u32 { 200 }

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Configuration handed to the SDK's `init`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkInitConfig {
    /// Consents the SDK starts with before the user decides
    #[serde(default = "default_consents")]
    pub consents: Vec<ConsentEntry>,

    /// Debug verbosity
    #[serde(default)]
    pub debug: DebugConfig,
}

fn default_consents() -> Vec<ConsentEntry> {
    vec![
        ConsentEntry::new(ConsentPurpose::Tracking, ConsentStatus::OptIn),
        ConsentEntry::new(ConsentPurpose::Analytics, ConsentStatus::OptIn),
    ]
}

impl Default for SdkInitConfig {
    fn default() -> Self {
        Self {
            consents: default_consents(),
            debug: DebugConfig::default(),
        }
    }
}

/// SDK debug settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfig {
    #[serde(default = "default_log_level")]
    pub log_level: u8,
}

fn default_log_level() -> u8 { 4 }

impl Default for DebugConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

/// Consent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentConfig {
    /// Storage key for persisted preferences
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Provider recorded on consent events
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Drop opt-in gated events until the user has decided
    #[serde(default = "default_true")]
    pub enforce_gate: bool,
}

fn default_storage_key() -> String { CONSENT_STORAGE_KEY.to_string() }
fn default_provider() -> String { "Website".to_string() }
fn default_true() -> bool { true }

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            provider: default_provider(),
            enforce_gate: true,
        }
    }
}

/// Personalization placement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizationConfig {
    /// Placement key passed to `fetch`
    #[serde(default = "default_placement")]
    pub placement: String,

    /// Attribute carrying the call-to-action text
    #[serde(default = "default_cta_attribute")]
    pub cta_attribute: String,

    /// Attributes tried in order for the image URL
    #[serde(default = "default_image_attributes")]
    pub image_attributes: Vec<String>,
}

fn default_placement() -> String { "special_content".to_string() }
fn default_cta_attribute() -> String { "CTA_Text".to_string() }
fn default_image_attributes() -> Vec<String> {
    // The live placement ships the misspelled key.
    vec!["Prouduct_Image_URL".to_string(), "Product_Image_URL".to_string()]
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            placement: default_placement(),
            cta_attribute: default_cta_attribute(),
            image_attributes: default_image_attributes(),
        }
    }
}

/// Identity mapping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// `IDType` sent on party identification events
    #[serde(default = "default_id_type")]
    pub id_type: String,
}

fn default_id_type() -> String { "Supabase".to_string() }

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { id_type: default_id_type() }
    }
}
