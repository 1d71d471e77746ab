use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::alert_engine::AlertEngine;
use crate::error::Result;
use crate::models::{AlertEvent, ItemFieldUpdate, PriceObservation};
use crate::storage::Storage;

/// A drop of at least this much is worth surfacing in logs.
const SIGNIFICANT_DROP_PERCENT: f64 = 5.0;

/// A drop of at least this much reads as a deal.
const DEAL_DROP_PERCENT: f64 = 10.0;

/// Classification of one observation against the item's previous one.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceChange {
    FirstObservation,
    Unchanged,
    Increased { percent: f64 },
    Decreased { percent: f64, significant: bool, deal: bool },
}

/// Records each new observation against the item's history and classifies the
/// movement, then hands the movement to the alert engine. History is
/// append-only; the item row and the observation commit together.
pub struct ChangeDetector {
    storage: Arc<dyn Storage>,
    engine: AlertEngine,
}

fn percent_change(previous: Decimal, current: Decimal) -> f64 {
    if previous <= Decimal::ZERO {
        return 0.0;
    }
    let delta = if current > previous {
        current - previous
    } else {
        previous - current
    };
    (delta / previous * Decimal::from(100)).to_f64().unwrap_or(0.0)
}

pub fn classify(previous: Option<Decimal>, current: Decimal) -> PriceChange {
    match previous {
        None => PriceChange::FirstObservation,
        Some(previous) if current == previous => PriceChange::Unchanged,
        Some(previous) if current > previous => PriceChange::Increased {
            percent: percent_change(previous, current),
        },
        Some(previous) => {
            let percent = percent_change(previous, current);
            PriceChange::Decreased {
                percent,
                significant: percent >= SIGNIFICANT_DROP_PERCENT,
                deal: percent >= DEAL_DROP_PERCENT,
            }
        }
    }
}

impl ChangeDetector {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let engine = AlertEngine::new(storage.clone());
        Self { storage, engine }
    }

    /// Record one scraped observation: append to history, update the item
    /// row in the same transaction, then evaluate alert rules against the
    /// movement. Returns the classification plus any events that fired.
    pub async fn process_price_change(
        &self,
        item_id: &str,
        name: Option<String>,
        new_price: Decimal,
        currency: &str,
        availability: &str,
    ) -> Result<(PriceChange, Vec<AlertEvent>)> {
        let previous = self
            .storage
            .get_latest_observation(item_id)
            .await?
            .map(|o| o.amount);

        let change = classify(previous, new_price);
        match &change {
            PriceChange::FirstObservation => {
                info!(item_id, price = %new_price, "first observation recorded")
            }
            PriceChange::Unchanged => debug!(item_id, price = %new_price, "price unchanged"),
            PriceChange::Increased { percent } => {
                info!(item_id, price = %new_price, percent, "price increased")
            }
            PriceChange::Decreased { percent, deal, .. } => {
                info!(item_id, price = %new_price, percent, deal, "price decreased")
            }
        }

        let observation = PriceObservation::new(
            item_id.to_string(),
            new_price,
            currency.to_string(),
            availability.to_string(),
        );
        self.storage
            .update_item_with_observation(
                item_id,
                ItemFieldUpdate {
                    name,
                    price: Some(new_price),
                    availability: Some(availability.to_string()),
                },
                observation,
            )
            .await?;

        let events = self.engine.evaluate(item_id, new_price, previous).await?;
        Ok((change, events))
    }
}
