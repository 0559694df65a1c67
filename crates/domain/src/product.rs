//! Catalog products as seen by checkout.

use common::DocumentId;
use serde::{Deserialize, Serialize};
use store::Document;

use crate::money::Money;

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: DocumentId,
    pub name: String,
    pub slug: String,
    /// List price per unit.
    pub price: Money,
    /// Stored discount percentage applied at checkout, if any.
    #[serde(default)]
    pub discount_percent: Option<f64>,
    /// Units on hand. Only meaningful when `track_stock` is set.
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_track_stock")]
    pub track_stock: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_track_stock() -> bool {
    true
}

fn default_active() -> bool {
    true
}

impl Product {
    /// Field holding the stock counter in the stored document.
    pub const STOCK_FIELD: &'static str = "stock";

    /// Creates an active, stock-tracked product.
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        price: Money,
        stock: i64,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            slug: slug.into(),
            price,
            discount_percent: None,
            stock,
            track_stock: true,
            is_active: true,
        }
    }

    /// Sets the stored discount percentage.
    pub fn with_discount(mut self, percent: f64) -> Self {
        self.discount_percent = Some(percent);
        self
    }

    /// Disables stock tracking (made-to-order or digital goods).
    pub fn untracked(mut self) -> Self {
        self.track_stock = false;
        self
    }

    /// Unit price after the stored discount. Authoritative for checkout.
    pub fn unit_price(&self) -> Money {
        match self.discount_percent {
            Some(percent) if percent > 0.0 => self.price.discounted_by(percent),
            _ => self.price,
        }
    }

    /// Returns true if `quantity` units can be sold right now.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        !self.track_stock || self.stock >= i64::from(quantity)
    }
}

impl Document for Product {
    const COLLECTION: &'static str = "products";

    fn id(&self) -> DocumentId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_price_applies_stored_discount() {
        let product = Product::new("Shirt", "shirt", Money::from_units(500), 3).with_discount(10.0);
        assert_eq!(product.unit_price(), Money::from_units(450));
    }

    #[test]
    fn unit_price_without_discount() {
        let product = Product::new("Shirt", "shirt", Money::from_units(500), 3);
        assert_eq!(product.unit_price(), Money::from_units(500));
        assert_eq!(
            product.clone().with_discount(0.0).unit_price(),
            Money::from_units(500)
        );
    }

    #[test]
    fn stock_check_respects_tracking() {
        let product = Product::new("Shirt", "shirt", Money::from_units(500), 1);
        assert!(product.has_stock_for(1));
        assert!(!product.has_stock_for(2));
        assert!(product.untracked().has_stock_for(100));
    }

    #[test]
    fn deserializes_with_defaults() {
        let id = DocumentId::new();
        let json = serde_json::json!({
            "id": id.to_string(),
            "name": "Mug",
            "slug": "mug",
            "price": 1200
        });
        let product: Product = serde_json::from_value(json).unwrap();
        assert!(product.track_stock);
        assert!(product.is_active);
        assert_eq!(product.stock, 0);
        assert_eq!(product.discount_percent, None);
    }
}
