use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::DealsConfig;
use crate::error::Result;
use crate::models::{deal::discount_percent, Category, Deal, DealFields, TrackedItem};
use crate::storage::Storage;

/// Scans recent price history per category and records a Deal for every item
/// whose current price undercuts its recent peak by at least the category's
/// minimum discount. Re-detection refreshes the existing deal instead of
/// stacking new ones.
pub struct DealDetector {
    storage: Arc<dyn Storage>,
    config: DealsConfig,
}

impl DealDetector {
    pub fn new(storage: Arc<dyn Storage>, config: DealsConfig) -> Self {
        Self { storage, config }
    }

    fn min_discount(&self, category: Category) -> f64 {
        match category {
            Category::Ecommerce => self.config.ecommerce_min_discount,
            Category::Travel => self.config.travel_min_discount,
            Category::RealEstate => self.config.real_estate_min_discount,
            Category::Utilities => self.config.utilities_min_discount,
        }
    }

    /// Run detection across all categories. Item-level failures are logged
    /// and skipped; the sweep always completes.
    pub async fn detect_deals(&self) -> Result<Vec<Deal>> {
        let mut deals = Vec::new();
        for category in Category::ALL {
            let items = self.storage.get_tracked_items(category).await?;
            info!(
                category = category.as_str(),
                items = items.len(),
                "deal detection pass"
            );

            for item in &items {
                match self.check_item(item).await {
                    Ok(Some(deal)) => deals.push(deal),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(item_id = %item.id, error = %e, "deal check failed, skipping item")
                    }
                }
            }
        }
        info!(deals = deals.len(), "deal detection finished");
        Ok(deals)
    }

    async fn check_item(&self, item: &TrackedItem) -> Result<Option<Deal>> {
        let Some(current) = item.current_price else {
            return Ok(None);
        };

        let since = Utc::now() - Duration::days(self.config.lookback_days);
        let observations = self.storage.get_observations_since(&item.id, since).await?;

        // Reference price is the recent peak, not the first observation
        let Some(original) = observations.iter().map(|o| o.amount).max() else {
            return Ok(None);
        };

        let Some(percent) = discount_percent(original, current) else {
            debug!(item_id = %item.id, "no discount against recent peak");
            return Ok(None);
        };

        // Boundary is inclusive: a discount exactly at the minimum qualifies
        if percent < self.min_discount(item.category) {
            debug!(item_id = %item.id, percent, "discount below category minimum");
            return Ok(None);
        }

        let deal = self
            .storage
            .upsert_deal(
                &item.id,
                DealFields {
                    category: item.category,
                    original_price: original,
                    deal_price: current,
                    discount_percent: percent,
                    deal_type: "price_drop".to_string(),
                    description: format!("{:.1}% off {}", percent, item.name),
                    valid_from: Some(Utc::now()),
                    valid_until: None,
                },
            )
            .await?;
        info!(item_id = %item.id, percent, "deal recorded");
        Ok(Some(deal))
    }
}

/// True when `deal` undercuts `original` by at least `minimum` percent.
pub fn qualifies(original: Decimal, deal: Decimal, minimum: f64) -> bool {
    discount_percent(original, deal).is_some_and(|p| p >= minimum)
}
