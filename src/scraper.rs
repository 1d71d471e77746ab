use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::currency::CurrencyNormalizer;
use crate::extract::{self, Confidence};
use crate::fetcher::Fetcher;
use crate::models::Category;
use crate::sites::SiteProfile;

/// A fully validated scrape result: name, settlement-currency price and
/// availability for one URL. No partial records are ever produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedItem {
    pub url: String,
    pub site: String,
    pub category: Category,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub availability: String,
    pub low_confidence: bool,
}

/// The one scrape pipeline shared by every site variant:
/// fetch -> parse -> extract(name) -> extract(price) -> normalize(price)
/// -> extract(availability) -> validate. Any absent step short-circuits
/// the whole call to None.
pub struct ItemScraper {
    fetcher: Arc<Fetcher>,
    normalizer: Arc<CurrencyNormalizer>,
}

impl ItemScraper {
    pub fn new(fetcher: Arc<Fetcher>, normalizer: Arc<CurrencyNormalizer>) -> Self {
        Self {
            fetcher,
            normalizer,
        }
    }

    pub async fn scrape(&self, profile: &SiteProfile, url: &str) -> Option<ScrapedItem> {
        // Site-specific pacing on top of the fetcher's own courtesy delay
        if profile.politeness_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(profile.politeness_delay_ms)).await;
        }

        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                debug!(url, error = %e, "fetch failed, no record");
                return None;
            }
        };

        // `Html` is not Send, so keep it scoped to a block that ends before
        // the next await point.
        let (name, price_text, availability, confidence) = {
            let document = Html::parse_document(&body);

            let mut confidence = Confidence::Selector;
            let mut name = extract::extract_field(&document, &profile.name_selectors);
            let mut price_text = extract::extract_price_field(&document, &profile.price_selectors);

            // Generic fallback runs only once the selector chain is exhausted
            if name.is_none() || price_text.is_none() {
                let fallback = extract::smart_extract(&document);
                if name.is_none() {
                    name = fallback.name;
                }
                if price_text.is_none() {
                    price_text = fallback.price_text;
                }
                confidence = Confidence::Fallback;
            }

            let availability =
                extract::extract_field(&document, &profile.availability_selectors)
                    .unwrap_or_else(|| "Unknown".to_string());

            (name, price_text, availability, confidence)
        };

        let name = name?;
        let price_text = price_text?;
        let price = self.normalizer.normalize(&price_text).await?;

        let item = ScrapedItem {
            url: url.to_string(),
            site: profile.site.clone(),
            category: profile.category,
            name,
            price,
            currency: self.normalizer.settlement_currency().to_string(),
            availability,
            low_confidence: confidence == Confidence::Fallback,
        };

        validate(&item).then_some(item)
    }
}

fn validate(item: &ScrapedItem) -> bool {
    !item.name.trim().is_empty()
        && item.price > Decimal::ZERO
        && url::Url::parse(&item.url).is_ok()
}
