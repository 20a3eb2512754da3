//! Tracking intents and the consent vocabulary they share with the SDK

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A semantic tracking intent raised by the UI
///
/// Each variant carries exactly the fields its vendor payload needs.
/// `None` (or an empty string) in an optional field means the key is
/// omitted from the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum TrackingEvent {
    /// Who the visitor is, known or anonymous
    Identity {
        is_anonymous: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phone_number: Option<String>,
    },

    /// A consent decision for one purpose
    Consent {
        purpose: String,
        status: ConsentStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },

    /// Email contact point for the profile
    ContactPointEmail { email: String },

    /// Mapping from an external user id to the profile
    PartyIdentification {
        user_id: String,
        id_type: String,
        id_name: String,
    },

    /// Interaction with a catalog object (product click)
    CatalogInteraction {
        interaction_name: String,
        catalog_type: String,
        object: CatalogObjectRef,
    },

    /// Free-form named interaction
    GenericInteraction {
        interaction_name: String,
        timestamp_ms: i64,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        additional: BTreeMap<String, AttributeValue>,
    },
}

impl TrackingEvent {
    /// Anonymous identity with no profile fields
    pub fn anonymous_identity() -> Self {
        TrackingEvent::Identity {
            is_anonymous: true,
            first_name: None,
            last_name: None,
            email: None,
            phone_number: None,
        }
    }

    /// Generic interaction stamped with the current time
    pub fn interaction(name: impl Into<String>) -> Self {
        TrackingEvent::GenericInteraction {
            interaction_name: name.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            additional: BTreeMap::new(),
        }
    }

    /// Short name used in logs and stats
    pub fn kind(&self) -> &'static str {
        match self {
            TrackingEvent::Identity { .. } => "identity",
            TrackingEvent::Consent { .. } => "consent",
            TrackingEvent::ContactPointEmail { .. } => "contact_point_email",
            TrackingEvent::PartyIdentification { .. } => "party_identification",
            TrackingEvent::CatalogInteraction { .. } => "catalog_interaction",
            TrackingEvent::GenericInteraction { .. } => "generic_interaction",
        }
    }

    /// Whether the event may be sent before the visitor has opted in
    pub fn is_consent_exempt(&self) -> bool {
        matches!(
            self,
            TrackingEvent::Identity { is_anonymous: true, .. } | TrackingEvent::Consent { .. }
        )
    }
}

/// Reference to a catalog object, such as a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObjectRef {
    /// Tracking id, shared with the catalog lookup key
    pub id: String,
    pub name: String,
    pub sku: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Value of an additional interaction attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Consent status as understood by the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsentStatus {
    OptIn,
    OptOut,
    NotProvided,
}

impl ConsentStatus {
    pub fn from_opt_in(opted_in: bool) -> Self {
        if opted_in {
            ConsentStatus::OptIn
        } else {
            ConsentStatus::OptOut
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::OptIn => "OptIn",
            ConsentStatus::OptOut => "OptOut",
            ConsentStatus::NotProvided => "NotProvided",
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purposes managed by the consent store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsentPurpose {
    Tracking,
    Analytics,
}

impl ConsentPurpose {
    pub const ALL: [ConsentPurpose; 2] = [ConsentPurpose::Tracking, ConsentPurpose::Analytics];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentPurpose::Tracking => "Tracking",
            ConsentPurpose::Analytics => "Analytics",
        }
    }
}

impl fmt::Display for ConsentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the SDK consent registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentEntry {
    pub purpose: String,
    pub status: ConsentStatus,
}

impl ConsentEntry {
    pub fn new(purpose: ConsentPurpose, status: ConsentStatus) -> Self {
        Self {
            purpose: purpose.as_str().to_string(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exemptions_cover_anonymous_identity_and_consent_only() {
        assert!(TrackingEvent::anonymous_identity().is_consent_exempt());
        assert!(TrackingEvent::Consent {
            purpose: "Tracking".into(),
            status: ConsentStatus::OptOut,
            provider: None,
        }
        .is_consent_exempt());

        let known = TrackingEvent::Identity {
            is_anonymous: false,
            first_name: Some("Ana".into()),
            last_name: None,
            email: None,
            phone_number: None,
        };
        assert!(!known.is_consent_exempt());
        assert!(!TrackingEvent::interaction("user_login").is_consent_exempt());
    }

    #[test]
    fn attribute_values_deserialize_by_shape() {
        let map: BTreeMap<String, AttributeValue> =
            serde_json::from_str(r#"{"a":true,"b":3,"c":1.5,"d":"x"}"#).unwrap();
        assert_eq!(map["a"], AttributeValue::Bool(true));
        assert_eq!(map["b"], AttributeValue::Int(3));
        assert_eq!(map["c"], AttributeValue::Float(1.5));
        assert_eq!(map["d"], AttributeValue::String("x".into()));
    }

    #[test]
    fn events_decode_from_tagged_json() {
        let event: TrackingEvent =
            serde_json::from_str(r#"{"intent":"contact_point_email","email":"a@b.co"}"#).unwrap();
        assert_eq!(event, TrackingEvent::ContactPointEmail { email: "a@b.co".into() });
        assert_eq!(event.kind(), "contact_point_email");
    }

    #[test]
    fn status_follows_opt_in_flag() {
        assert_eq!(ConsentStatus::from_opt_in(true), ConsentStatus::OptIn);
        assert_eq!(ConsentStatus::from_opt_in(false), ConsentStatus::OptOut);
        assert_eq!(ConsentStatus::NotProvided.to_string(), "NotProvided");
    }
}
