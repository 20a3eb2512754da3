//! Payload normalization
//!
//! Pure mapping from a [`TrackingEvent`] to the JSON object the SDK's
//! `sendEvent` expects. Nothing here touches the SDK or shared state.
//!
//! | intent               | payload root                                        |
//! |----------------------|-----------------------------------------------------|
//! | Identity             | `user.attributes` with `eventType: "identity"`      |
//! | Consent              | `eventType: "consentLog"`, category `Engagement`    |
//! | ContactPointEmail    | `eventType: "contactPointEmail"`, category `Profile`|
//! | PartyIdentification  | `eventType: "partyIdentification"`, `Profile`       |
//! | CatalogInteraction   | `interaction.catalogObject`                         |
//! | GenericInteraction   | `eventType: "catalog"`, category `Engagement`       |

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::event::{AttributeValue, CatalogObjectRef, ConsentStatus, TrackingEvent};

/// `isAnonymous` value for an anonymous visitor
pub const ANONYMOUS: u8 = 1;

/// `isAnonymous` value for a known visitor
pub const KNOWN: u8 = 0;

/// Build the vendor payload for an event
pub fn normalize(event: &TrackingEvent) -> Value {
    match event {
        TrackingEvent::Identity {
            is_anonymous,
            first_name,
            last_name,
            email,
            phone_number,
        } => identity(
            *is_anonymous,
            first_name.as_deref(),
            last_name.as_deref(),
            email.as_deref(),
            phone_number.as_deref(),
        ),
        TrackingEvent::Consent {
            purpose,
            status,
            provider,
        } => consent(purpose, *status, provider.as_deref()),
        TrackingEvent::ContactPointEmail { email } => contact_point_email(email),
        TrackingEvent::PartyIdentification {
            user_id,
            id_type,
            id_name,
        } => party_identification(user_id, id_type, id_name),
        TrackingEvent::CatalogInteraction {
            interaction_name,
            catalog_type,
            object,
        } => catalog_interaction(interaction_name, catalog_type, object),
        TrackingEvent::GenericInteraction {
            interaction_name,
            timestamp_ms,
            additional,
        } => generic_interaction(interaction_name, *timestamp_ms, additional),
    }
}

fn identity(
    is_anonymous: bool,
    first_name: Option<&str>,
    last_name: Option<&str>,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Value {
    let mut attributes = Map::new();
    attributes.insert("eventType".into(), json!("identity"));
    attributes.insert(
        "isAnonymous".into(),
        json!(if is_anonymous { ANONYMOUS } else { KNOWN }),
    );
    insert_present(&mut attributes, "firstName", first_name);
    insert_present(&mut attributes, "lastName", last_name);
    insert_present(&mut attributes, "email", email);
    insert_present(&mut attributes, "phoneNumber", phone_number);

    json!({ "user": { "attributes": attributes } })
}

fn consent(purpose: &str, status: ConsentStatus, provider: Option<&str>) -> Value {
    let mut payload = Map::new();
    payload.insert("eventType".into(), json!("consentLog"));
    payload.insert("category".into(), json!("Engagement"));
    payload.insert("purpose".into(), json!(purpose));
    payload.insert("status".into(), json!(status.as_str()));
    insert_present(&mut payload, "provider", provider);
    Value::Object(payload)
}

fn contact_point_email(email: &str) -> Value {
    json!({
        "eventType": "contactPointEmail",
        "category": "Profile",
        "email": email,
    })
}

fn party_identification(user_id: &str, id_type: &str, id_name: &str) -> Value {
    json!({
        "eventType": "partyIdentification",
        "category": "Profile",
        "userId": user_id,
        "IDType": id_type,
        "IDName": id_name,
    })
}

fn catalog_interaction(interaction_name: &str, catalog_type: &str, object: &CatalogObjectRef) -> Value {
    let mut attributes = Map::new();
    attributes.insert("name".into(), json!(object.name));
    attributes.insert("sku".into(), json!(object.sku));
    for (key, value) in &object.extra {
        attributes.insert(key.clone(), json!(value));
    }

    json!({
        "interaction": {
            "name": interaction_name,
            "catalogObject": {
                "type": catalog_type,
                "id": object.id,
                "attributes": attributes,
            }
        }
    })
}

fn generic_interaction(
    interaction_name: &str,
    timestamp_ms: i64,
    additional: &BTreeMap<String, AttributeValue>,
) -> Value {
    let mut payload = Map::new();
    payload.insert("eventType".into(), json!("catalog"));
    payload.insert("category".into(), json!("Engagement"));
    payload.insert("interactionName".into(), json!(interaction_name));
    payload.insert("id".into(), json!(format!("interaction-{}", timestamp_ms)));
    payload.insert("type".into(), json!("interaction"));
    for (key, value) in additional {
        payload.insert(key.clone(), attribute_value(value));
    }
    Value::Object(payload)
}

fn attribute_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Bool(b) => json!(b),
        AttributeValue::Int(i) => json!(i),
        AttributeValue::Float(f) => json!(f),
        AttributeValue::String(s) => json!(s),
    }
}

/// Insert only non-empty values; absent fields never become `""` or `null`
fn insert_present(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        map.insert(key.to_string(), json!(value));
    }
}
