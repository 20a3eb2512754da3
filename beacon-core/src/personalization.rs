//! Personalized hero content
//!
//! Server-decided call-to-action text and image for a named placement.
//! Every failure mode ends in default content: the module may be missing
//! from the loaded beacon, the response may carry no decisions, or the
//! fetch may fail outright.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::PersonalizationConfig;
use crate::context::TrackingContext;
use crate::sdk::PersonalizationResponse;

/// Content for the personalized block; `None` means "show the default"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizedContent {
    pub cta_text: Option<String>,
    pub image_url: Option<String>,
}

impl PersonalizedContent {
    /// Read the first decision's attributes
    pub fn from_response(response: &PersonalizationResponse, config: &PersonalizationConfig) -> Self {
        let Some(attributes) = response
            .personalizations
            .as_ref()
            .and_then(|items| items.first())
            .and_then(|item| item.attributes.as_ref())
        else {
            return Self::default();
        };

        Self {
            cta_text: attributes.get(&config.cta_attribute).cloned(),
            image_url: config
                .image_attributes
                .iter()
                .find_map(|key| attributes.get(key))
                .cloned(),
        }
    }

    /// Nothing personalized; the default hero stays
    pub fn is_default(&self) -> bool {
        self.cta_text.is_none() && self.image_url.is_none()
    }
}

/// Fetches personalized content once the SDK is ready
pub struct PersonalizationClient {
    context: Arc<TrackingContext>,
    config: PersonalizationConfig,
}

impl PersonalizationClient {
    pub fn new(context: Arc<TrackingContext>, config: PersonalizationConfig) -> Self {
        Self { context, config }
    }

    /// Wait for readiness, then fetch the configured placement
    pub async fn hero_content(&self) -> PersonalizedContent {
        self.context.readiness().wait_ready().await;
        self.fetch_now().await
    }

    /// Fetch immediately; default content if the SDK is not ready
    pub async fn fetch_now(&self) -> PersonalizedContent {
        let Some(sdk) = self.context.ready_sdk() else {
            info!("Tracking SDK not ready; skipping personalized block");
            return PersonalizedContent::default();
        };

        let keys = vec![self.config.placement.clone()];
        match sdk.fetch_personalization(&keys).await {
            Ok(Some(response)) => {
                let content = PersonalizedContent::from_response(&response, &self.config);
                if content.is_default() {
                    info!(placement = %self.config.placement, "No personalization attributes found");
                }
                content
            }
            Ok(None) => {
                info!("Personalization module not available; skipping personalized block");
                PersonalizedContent::default()
            }
            Err(e) => {
                error!(placement = %self.config.placement, error = %e, "Failed to fetch personalization");
                PersonalizedContent::default()
            }
        }
    }
}
