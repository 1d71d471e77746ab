use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{generate_id, Category};

/// A detected discount condition for a tracked item. At most one active deal
/// exists per item per category; re-detection updates it in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub id: String,
    pub item_id: String,
    pub category: Category,
    pub original_price: Decimal,
    pub deal_price: Decimal,
    pub discount_percent: f64,
    pub deal_type: String,
    pub description: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealFields {
    pub category: Category,
    pub original_price: Decimal,
    pub deal_price: Decimal,
    pub discount_percent: f64,
    pub deal_type: String,
    pub description: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Discount of `deal` against `original`, as a percentage rounded to one
/// decimal for display. Returns None unless `deal < original`.
pub fn discount_percent(original: Decimal, deal: Decimal) -> Option<f64> {
    if original <= Decimal::ZERO || deal >= original {
        return None;
    }
    let ratio = (original - deal) / original * Decimal::from(100);
    let rounded = ratio.round_dp(1);
    rounded.to_f64()
}

impl Deal {
    pub fn new(item_id: String, fields: DealFields) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            item_id,
            category: fields.category,
            original_price: fields.original_price,
            deal_price: fields.deal_price,
            discount_percent: fields.discount_percent,
            deal_type: fields.deal_type,
            description: fields.description,
            valid_from: fields.valid_from,
            valid_until: fields.valid_until,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Re-detection path: refresh prices on the existing active deal.
    pub fn refresh(&mut self, fields: DealFields) {
        self.original_price = fields.original_price;
        self.deal_price = fields.deal_price;
        self.discount_percent = fields.discount_percent;
        self.deal_type = fields.deal_type;
        self.description = fields.description;
        self.valid_from = fields.valid_from;
        self.valid_until = fields.valid_until;
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

    #[test]
    fn test_discount_percent_basic() {
        assert_eq!(
            discount_percent(price("1000"), price("850")),
            Some(15.0)
        );
        assert_eq!(discount_percent(price("20.00"), price("18.00")), Some(10.0));
    }

    #[test]
    fn test_discount_percent_rounds_to_one_decimal() {
        // (300 - 199) / 300 * 100 = 33.666... -> 33.7
        assert_eq!(discount_percent(price("300"), price("199")), Some(33.7));
    }

    #[test]
    fn test_discount_percent_requires_lower_price() {
        assert_eq!(discount_percent(price("100"), price("100")), None);
        assert_eq!(discount_percent(price("100"), price("120")), None);
        assert_eq!(discount_percent(price("0"), price("0")), None);
    }

    #[test]
    fn test_deal_refresh_keeps_identity() {
        let mut deal = Deal::new(
            "item1".to_string(),
            DealFields {
                category: Category::Ecommerce,
                original_price: price("1000"),
                deal_price: price("850"),
                discount_percent: 15.0,
                deal_type: "price_drop".to_string(),
                description: "15.0% off".to_string(),
                valid_from: None,
                valid_until: None,
            },
        );
        let id = deal.id.clone();

        deal.refresh(DealFields {
            category: Category::Ecommerce,
            original_price: price("1000"),
            deal_price: price("800"),
            discount_percent: 20.0,
            deal_type: "price_drop".to_string(),
            description: "20.0% off".to_string(),
            valid_from: None,
            valid_until: None,
        });

        assert_eq!(deal.id, id);
        assert_eq!(deal.deal_price, price("800"));
        assert_eq!(deal.discount_percent, 20.0);
        assert!(deal.is_active);
    }
}
