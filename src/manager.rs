use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::change_detector::ChangeDetector;
use crate::config::ScraperConfig;
use crate::error::Result;
use crate::models::{Category, CategoryHint, ItemFieldUpdate, NewTrackedItem, TrackedItem};
use crate::scraper::{ItemScraper, ScrapedItem};
use crate::sites::SiteRegistry;
use crate::storage::Storage;

/// Per-category tally of one sweep run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub category: Category,
    pub attempted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Fans scrapes out across items with bounded concurrency and feeds each
/// result through the change detector. One item failing, whether at fetch,
/// extraction or persistence, never stops the sweep.
pub struct ScraperManager {
    storage: Arc<dyn Storage>,
    scraper: Arc<ItemScraper>,
    registry: SiteRegistry,
    detector: ChangeDetector,
    config: ScraperConfig,
    semaphore: Arc<Semaphore>,
}

impl ScraperManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        scraper: Arc<ItemScraper>,
        config: ScraperConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_scrapes));
        let detector = ChangeDetector::new(storage.clone());
        Self {
            storage,
            scraper,
            registry: SiteRegistry::new(),
            detector,
            config,
            semaphore,
        }
    }

    /// Scrape one URL and persist the result. Unknown URLs are registered as
    /// new tracked items on their first successful scrape. Returns the item
    /// as stored afterwards, or None when no valid record came back.
    pub async fn scrape_one(
        &self,
        url: &str,
        hint: CategoryHint,
    ) -> Result<Option<TrackedItem>> {
        let profile = self.registry.resolve(url, hint);
        let Some(scraped) = self.scraper.scrape(&profile, url).await else {
            debug!(url, "no valid record for url");
            return Ok(None);
        };

        let item_id = match self.storage.find_item_by_url(url).await? {
            Some(item) => item.id,
            None => {
                let item = TrackedItem::new(NewTrackedItem {
                    url: url.to_string(),
                    site: scraped.site.clone(),
                    category: scraped.category,
                    name: scraped.name.clone(),
                    current_price: None,
                    currency: scraped.currency.clone(),
                    availability: None,
                });
                info!(url, item_id = %item.id, "registered new tracked item");
                self.storage.insert_item(&item).await?;
                item.id
            }
        };

        self.persist(&item_id, &scraped).await?;
        self.storage.find_item_by_url(url).await
    }

    /// Price unchanged: refresh name/availability only, no history row.
    /// Price moved (or first observation): the change detector records the
    /// observation and runs the alert rules.
    async fn persist(&self, item_id: &str, scraped: &ScrapedItem) -> Result<()> {
        let current = self
            .storage
            .find_item_by_url(&scraped.url)
            .await?
            .and_then(|i| i.current_price);

        if current == Some(scraped.price) {
            self.storage
                .update_item_fields(
                    item_id,
                    ItemFieldUpdate {
                        name: Some(scraped.name.clone()),
                        price: None,
                        availability: Some(scraped.availability.clone()),
                    },
                )
                .await?;
            return Ok(());
        }

        self.detector
            .process_price_change(
                item_id,
                Some(scraped.name.clone()),
                scraped.price,
                &scraped.currency,
                &scraped.availability,
            )
            .await?;
        Ok(())
    }

    /// Scrape a list of URLs in batches. Within a batch, scrapes run
    /// concurrently under the semaphore; between batches the manager pauses.
    /// Only successful records are returned, in input order.
    pub async fn scrape_many(&self, urls: &[String], hint: CategoryHint) -> Vec<TrackedItem> {
        let mut results = Vec::with_capacity(urls.len());

        for (index, batch) in urls.chunks(self.config.batch_size).enumerate() {
            if index > 0 && self.config.batch_pause_ms > 0 {
                debug!(batch = index, "pausing between batches");
                tokio::time::sleep(Duration::from_millis(self.config.batch_pause_ms)).await;
            }

            let scrapes = batch.iter().map(|url| async move {
                let _permit = match self.semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return None,
                };
                match self.scrape_one(url, hint).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(url, error = %e, "scrape failed, continuing sweep");
                        None
                    }
                }
            });
            results.extend(join_all(scrapes).await.into_iter().flatten());
        }

        results
    }

    /// Re-scrape every tracked, active item in `category`.
    pub async fn sweep_category(&self, category: Category) -> Result<SweepOutcome> {
        let items = self.storage.get_tracked_items(category).await?;
        let urls: Vec<String> = items.into_iter().map(|i| i.url).collect();
        let attempted = urls.len();

        info!(category = category.as_str(), attempted, "starting category sweep");
        let results = self.scrape_many(&urls, CategoryHint::Fixed(category)).await;
        let updated = results.len();

        let outcome = SweepOutcome {
            category,
            attempted,
            updated,
            failed: attempted - updated,
        };
        info!(
            category = category.as_str(),
            updated = outcome.updated,
            failed = outcome.failed,
            "category sweep finished"
        );
        Ok(outcome)
    }

    pub async fn scrape_ecommerce_products(&self) -> Result<SweepOutcome> {
        self.sweep_category(Category::Ecommerce).await
    }

    pub async fn scrape_travel_deals(&self) -> Result<SweepOutcome> {
        self.sweep_category(Category::Travel).await
    }

    pub async fn scrape_real_estate_properties(&self) -> Result<SweepOutcome> {
        self.sweep_category(Category::RealEstate).await
    }

    pub async fn scrape_utility_services(&self) -> Result<SweepOutcome> {
        self.sweep_category(Category::Utilities).await
    }

    /// Full sweep across all four categories, sequentially.
    pub async fn sweep_all(&self) -> Result<Vec<SweepOutcome>> {
        let mut outcomes = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            outcomes.push(self.sweep_category(category).await?);
        }
        Ok(outcomes)
    }
}
