use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::generate_id;

/// One normalized price reading for a tracked item. Append-only; never
/// mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceObservation {
    pub id: String,
    pub item_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub availability: String,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    pub fn new(item_id: String, amount: Decimal, currency: String, availability: String) -> Self {
        Self {
            id: generate_id(),
            item_id,
            amount,
            currency,
            availability,
            source: "scraper".to_string(),
            observed_at: Utc::now(),
        }
    }
}
