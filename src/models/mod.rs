use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod alert;
pub mod deal;
pub mod price_observation;
pub mod tracked_item;

// Re-exports for convenience
pub use alert::*;
pub use deal::*;
pub use price_observation::*;
pub use tracked_item::*;

// Common enums used across models
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[sqlx(rename = "ecommerce")]
    Ecommerce,
    #[sqlx(rename = "travel")]
    Travel,
    #[sqlx(rename = "real_estate")]
    RealEstate,
    #[sqlx(rename = "utilities")]
    Utilities,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Ecommerce,
        Category::Travel,
        Category::RealEstate,
        Category::Utilities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ecommerce => "ecommerce",
            Category::Travel => "travel",
            Category::RealEstate => "real_estate",
            Category::Utilities => "utilities",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "ecommerce" => Some(Category::Ecommerce),
            "travel" => Some(Category::Travel),
            "real_estate" => Some(Category::RealEstate),
            "utilities" => Some(Category::Utilities),
            _ => None,
        }
    }
}

/// Category hint supplied when resolving a scraper for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryHint {
    Auto,
    Fixed(Category),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    #[sqlx(rename = "price_drop")]
    PriceDrop,
    #[sqlx(rename = "threshold")]
    Threshold,
    #[sqlx(rename = "deal_appeared")]
    DealAppeared,
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serialization() {
        assert_eq!(
            serde_json::to_string(&Category::Ecommerce).unwrap(),
            "\"ecommerce\""
        );
        assert_eq!(
            serde_json::to_string(&Category::RealEstate).unwrap(),
            "\"real_estate\""
        );
    }

    #[test]
    fn test_category_roundtrip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("groceries"), None);
    }

    #[test]
    fn test_rule_type_values() {
        let values = vec![RuleType::PriceDrop, RuleType::Threshold, RuleType::DealAppeared];
        for value in values {
            let serialized = serde_json::to_string(&value).unwrap();
            let deserialized: RuleType = serde_json::from_str(&serialized).unwrap();
            assert_eq!(value, deserialized);
        }
    }

    #[test]
    fn test_generate_id() {
        let id1 = generate_id();
        let id2 = generate_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 32); // UUID simple format is 32 chars
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
