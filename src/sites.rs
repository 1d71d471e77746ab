use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::{Category, CategoryHint};

/// Per-site scraping configuration. Variants differ only in selector lists
/// and pacing; the pipeline shape is shared (see `scraper.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub site: String,
    pub category: Category,
    pub name_selectors: Vec<String>,
    pub price_selectors: Vec<String>,
    pub availability_selectors: Vec<String>,
    pub politeness_delay_ms: u64,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SiteProfile {
    /// Minimal default selector set for domains nothing else matched.
    pub fn minimal_default(category: Category) -> Self {
        Self {
            site: "generic".to_string(),
            category,
            name_selectors: strings(&["h1", ".product-name", ".title"]),
            price_selectors: strings(&[".price", "[class*='price']", ".amount"]),
            availability_selectors: strings(&[".availability", ".stock"]),
            politeness_delay_ms: 1000,
        }
    }

    /// Preset for storefronts built on the common templating platforms;
    /// their themes share class conventions even across unrelated shops.
    pub fn storefront_platform(category: Category) -> Self {
        Self {
            site: "storefront-platform".to_string(),
            category,
            name_selectors: strings(&[
                ".product__title",
                ".product-single__title",
                "h1.product_title",
                "h1",
            ]),
            price_selectors: strings(&[
                ".price__regular .price-item",
                ".product__price",
                "span.price ins .amount",
                "span.price .amount",
                ".price",
            ]),
            availability_selectors: strings(&[".product__inventory", ".stock", "p.stock"]),
            politeness_delay_ms: 1000,
        }
    }

    pub fn generic_for(category: Category) -> Self {
        match category {
            Category::Ecommerce => Self {
                site: "generic-ecommerce".to_string(),
                category,
                name_selectors: strings(&[
                    "h1.product-name",
                    ".product-title",
                    "h1[itemprop='name']",
                    "h1",
                ]),
                price_selectors: strings(&[
                    "[itemprop='price']",
                    ".product-price",
                    ".price-box .price",
                    ".price",
                    "[class*='price']",
                ]),
                availability_selectors: strings(&[
                    "[itemprop='availability']",
                    ".availability",
                    ".stock-status",
                ]),
                politeness_delay_ms: 1000,
            },
            Category::Travel => Self {
                site: "generic-travel".to_string(),
                category,
                name_selectors: strings(&[
                    ".hotel-name",
                    ".flight-route",
                    "h1.listing-title",
                    "h1",
                ]),
                price_selectors: strings(&[
                    ".fare-price",
                    ".room-rate",
                    ".total-price",
                    ".price",
                ]),
                availability_selectors: strings(&[".seats-left", ".rooms-left", ".availability"]),
                politeness_delay_ms: 2000,
            },
            Category::RealEstate => Self {
                site: "generic-real-estate".to_string(),
                category,
                name_selectors: strings(&[
                    ".property-title",
                    "h1.listing-title",
                    "h1[itemprop='name']",
                    "h1",
                ]),
                price_selectors: strings(&[
                    ".property-price",
                    ".listing-price",
                    "[class*='price']",
                ]),
                availability_selectors: strings(&[".listing-status", ".availability"]),
                politeness_delay_ms: 1500,
            },
            Category::Utilities => Self {
                site: "generic-utilities".to_string(),
                category,
                name_selectors: strings(&[".plan-name", ".tariff-name", "h2.plan-title", "h1"]),
                price_selectors: strings(&[
                    ".plan-price",
                    ".tariff-rate",
                    ".monthly-cost",
                    ".price",
                ]),
                availability_selectors: strings(&[".plan-status", ".availability"]),
                politeness_delay_ms: 1000,
            },
        }
    }
}

/// Resolves a URL plus category hint to a site profile. Never fails for a
/// syntactically valid URL; there is always a fallback.
pub struct SiteRegistry {
    domains: HashMap<String, SiteProfile>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        let mut domains = HashMap::new();

        domains.insert(
            "jumia.com.ng".to_string(),
            SiteProfile {
                site: "jumia".to_string(),
                category: Category::Ecommerce,
                name_selectors: strings(&["h1.-fs20", "h1.title", "h1"]),
                price_selectors: strings(&[
                    "span.-b.-ubpt.-tal.-fs24",
                    "span.-b.-ltr.-tal.-fs24",
                    ".price",
                ]),
                availability_selectors: strings(&[".-df.-i-ctr.-fs12", ".stock"]),
                politeness_delay_ms: 2000,
            },
        );

        domains.insert(
            "konga.com".to_string(),
            SiteProfile {
                site: "konga".to_string(),
                category: Category::Ecommerce,
                name_selectors: strings(&["h4._24849_2Ymhg", "h1", ".product-name"]),
                price_selectors: strings(&["span._678e4_e6nqh", ".product-price", ".price"]),
                availability_selectors: strings(&[".stock-status", ".availability"]),
                politeness_delay_ms: 2000,
            },
        );

        domains.insert(
            "wakanow.com".to_string(),
            SiteProfile {
                site: "wakanow".to_string(),
                category: Category::Travel,
                name_selectors: strings(&[".flight-route", ".itinerary-title", "h1"]),
                price_selectors: strings(&[".fare-amount", ".total-fare", ".price"]),
                availability_selectors: strings(&[".seats-remaining", ".availability"]),
                politeness_delay_ms: 3000,
            },
        );

        domains.insert(
            "hotels.ng".to_string(),
            SiteProfile {
                site: "hotels-ng".to_string(),
                category: Category::Travel,
                name_selectors: strings(&["h1.listing-name", ".hotel-name", "h1"]),
                price_selectors: strings(&[".listing-price", ".room-price", ".price"]),
                availability_selectors: strings(&[".rooms-available", ".availability"]),
                politeness_delay_ms: 2000,
            },
        );

        domains.insert(
            "propertypro.ng".to_string(),
            SiteProfile {
                site: "propertypro".to_string(),
                category: Category::RealEstate,
                name_selectors: strings(&["h1.pl-title", ".property-title", "h1"]),
                price_selectors: strings(&["h3.listings-price", ".property-price", ".price"]),
                availability_selectors: strings(&[".furnished-btn", ".listing-status"]),
                politeness_delay_ms: 2000,
            },
        );

        domains.insert(
            "privateproperty.com.ng".to_string(),
            SiteProfile {
                site: "privateproperty".to_string(),
                category: Category::RealEstate,
                name_selectors: strings(&["h1.property-title", "h1"]),
                price_selectors: strings(&[".property-details-price", ".price"]),
                availability_selectors: strings(&[".property-status"]),
                politeness_delay_ms: 2000,
            },
        );

        domains.insert(
            "buypower.ng".to_string(),
            SiteProfile {
                site: "buypower".to_string(),
                category: Category::Utilities,
                name_selectors: strings(&[".tariff-name", ".plan-name", "h1"]),
                price_selectors: strings(&[".tariff-amount", ".plan-price", ".price"]),
                availability_selectors: strings(&[".plan-status"]),
                politeness_delay_ms: 1500,
            },
        );

        Self { domains }
    }

    /// Infer the category for a host from the registered-site table.
    /// Unknown domains default to e-commerce.
    pub fn detect_category(&self, host: &str) -> Category {
        let host = host.strip_prefix("www.").unwrap_or(host);
        self.domains
            .get(host)
            .map(|p| p.category)
            .unwrap_or(Category::Ecommerce)
    }

    pub fn resolve(&self, url: &str, hint: CategoryHint) -> SiteProfile {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

        let category = match hint {
            CategoryHint::Fixed(category) => category,
            CategoryHint::Auto => self.detect_category(&host),
        };

        // Exact-domain match wins within the resolved category
        if let Some(profile) = self.domains.get(&host) {
            if profile.category == category {
                return profile.clone();
            }
        }

        if host.ends_with(".myshopify.com") || host.contains("shopify") {
            return SiteProfile::storefront_platform(category);
        }

        if host.is_empty() {
            return SiteProfile::minimal_default(category);
        }

        SiteProfile::generic_for(category)
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
