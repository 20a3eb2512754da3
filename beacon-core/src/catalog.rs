//! Product catalog shown on the landing page

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::{CatalogObjectRef, TrackingEvent};

/// Interaction name for a product card click
pub const VIEW_PRODUCT_INTERACTION: &str = "View_Product_Object";

/// Catalog object type for products
pub const PRODUCT_CATALOG_TYPE: &str = "Product";

/// A product card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Catalog id, also the lookup key for clicks
    pub id: String,
    pub name: String,
    pub sku: String,
    pub description: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

impl Product {
    /// Catalog interaction for a click on this product
    ///
    /// The SKU is the tracked object id; the catalog id travels along as the
    /// `productId` attribute.
    pub fn click_event(&self) -> TrackingEvent {
        let mut extra = BTreeMap::new();
        extra.insert("productId".to_string(), self.id.clone());

        TrackingEvent::CatalogInteraction {
            interaction_name: VIEW_PRODUCT_INTERACTION.to_string(),
            catalog_type: PRODUCT_CATALOG_TYPE.to_string(),
            object: CatalogObjectRef {
                id: self.sku.clone(),
                name: self.name.clone(),
                sku: self.sku.clone(),
                extra,
            },
        }
    }
}

/// Ordered product list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            product(
                "PRD001",
                "Laptop X1",
                "LAPTOP-X1",
                "High performance laptop",
                "https://images.pexels.com/photos/18105/pexels-photo.jpg?auto=compress&cs=tinysrgb&w=800",
                "Best Seller",
            ),
            product(
                "PRD002",
                "Headset Pro",
                "HDP-900",
                "Premium noise-cancelling headset",
                "https://images.pexels.com/photos/3394664/pexels-photo-3394664.jpeg?auto=compress&cs=tinysrgb&w=800",
                "New",
            ),
            product(
                "PRD003",
                "FitWatch Z",
                "FWZ-2024",
                "Smart fitness watch with GPS",
                "https://images.pexels.com/photos/267394/pexels-photo-267394.jpeg?auto=compress&cs=tinysrgb&w=800",
                "Trending",
            ),
        ])
    }
}

fn product(id: &str, name: &str, sku: &str, description: &str, image_url: &str, badge: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        sku: sku.to_string(),
        description: description.to_string(),
        image_url: image_url.to_string(),
        badge: Some(badge.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_three_products() {
        let catalog = Catalog::default();
        let ids: Vec<&str> = catalog.products().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["PRD001", "PRD002", "PRD003"]);
        assert!(catalog.get("PRD999").is_none());
    }

    #[test]
    fn click_event_tracks_sku_with_product_id() {
        let event = Catalog::default().get("PRD002").unwrap().click_event();
        match event {
            TrackingEvent::CatalogInteraction {
                interaction_name,
                catalog_type,
                object,
            } => {
                assert_eq!(interaction_name, "View_Product_Object");
                assert_eq!(catalog_type, "Product");
                assert_eq!(object.id, "HDP-900");
                assert_eq!(object.sku, "HDP-900");
                assert_eq!(object.name, "Headset Pro");
                assert_eq!(object.extra.get("productId").map(String::as_str), Some("PRD002"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn repeated_clicks_describe_the_same_object() {
        let catalog = Catalog::default();
        let product = catalog.get("PRD001").unwrap();
        assert_eq!(product.click_event(), product.click_event());
    }
}
