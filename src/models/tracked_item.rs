use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{generate_id, Category};

/// One thing being monitored: a product, flight, hotel, property or service.
/// Soft-deleted via `is_active` rather than removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedItem {
    pub id: String,
    pub url: String,
    pub site: String,
    pub category: Category,
    pub name: String,
    pub current_price: Option<Decimal>,
    pub currency: String,
    pub availability: String,
    pub is_tracked: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrackedItem {
    pub url: String,
    pub site: String,
    pub category: Category,
    pub name: String,
    pub current_price: Option<Decimal>,
    pub currency: String,
    pub availability: Option<String>,
}

/// Field-level update applied by a sweep; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFieldUpdate {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub availability: Option<String>,
}

impl TrackedItem {
    pub fn new(new_item: NewTrackedItem) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            url: new_item.url,
            site: new_item.site,
            category: new_item.category,
            name: new_item.name,
            current_price: new_item.current_price,
            currency: new_item.currency,
            availability: new_item
                .availability
                .unwrap_or_else(|| "Unknown".to_string()),
            is_tracked: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: ItemFieldUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(price) = update.price {
            self.current_price = Some(price);
        }
        if let Some(availability) = update.availability {
            self.availability = availability;
        }
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn price(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn new_item() -> NewTrackedItem {
        NewTrackedItem {
            url: "https://shop.example.com/p/123".to_string(),
            site: "shop.example.com".to_string(),
            category: Category::Ecommerce,
            name: "Blender 500W".to_string(),
            current_price: Some(price("45000.00")),
            currency: "NGN".to_string(),
            availability: None,
        }
    }

    #[test]
    fn test_item_creation_defaults() {
        let item = TrackedItem::new(new_item());

        assert_eq!(item.name, "Blender 500W");
        assert_eq!(item.availability, "Unknown");
        assert!(item.is_tracked);
        assert!(item.is_active);
        assert_eq!(item.id.len(), 32);
    }

    #[test]
    fn test_field_update_partial() {
        let mut item = TrackedItem::new(new_item());
        let original_name = item.name.clone();

        item.apply_update(ItemFieldUpdate {
            name: None,
            price: Some(price("42000.00")),
            availability: Some("In Stock".to_string()),
        });

        assert_eq!(item.name, original_name); // Unchanged
        assert_eq!(item.current_price, Some(price("42000.00")));
        assert_eq!(item.availability, "In Stock");
    }

    #[test]
    fn test_deactivate_is_soft() {
        let mut item = TrackedItem::new(new_item());
        item.deactivate();

        assert!(!item.is_active);
        assert!(item.is_tracked); // Tracking preference survives soft delete
    }
}
