//! Product entity.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, SellerId};
use serde::{Deserialize, Serialize};

/// A sellable product with its authoritative stock counter.
///
/// `stock` is the single durable count of unsold units. It is mutated
/// only through the store's conditional decrement/increment operations,
/// and those only ever run under the product's distributed lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,

    /// Human-readable product name.
    pub name: String,

    /// Current unit price; frozen into order items at purchase time.
    pub price: Money,

    /// Authoritative count of unsold units, never negative.
    pub stock: i64,

    /// Catalog category.
    pub category: String,

    /// The seller offering this product.
    pub seller_id: SellerId,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product.
    pub fn new(
        name: impl Into<String>,
        price: Money,
        stock: i64,
        category: impl Into<String>,
        seller_id: SellerId,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            stock,
            category: category.into(),
            seller_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product_gets_unique_id() {
        let seller = SellerId::new();
        let a = Product::new("Widget", Money::from_cents(1000), 5, "tools", seller);
        let b = Product::new("Widget", Money::from_cents(1000), 5, "tools", seller);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_product_serialization_roundtrip() {
        let product = Product::new(
            "Gadget",
            Money::from_cents(2500),
            10,
            "electronics",
            SellerId::new(),
        );
        let json = serde_json::to_string(&product).unwrap();
        let deserialized: Product = serde_json::from_str(&json).unwrap();
        assert_eq!(product, deserialized);
    }
}
