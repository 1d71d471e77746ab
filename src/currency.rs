use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::rates::RateSource;

/// Prioritized currency markers; longer/more specific markers first so "US$"
/// wins over "$" and "CN¥" over "¥".
const CURRENCY_MARKERS: [(&str, &str); 19] = [
    ("US$", "USD"),
    ("USD", "USD"),
    ("CN¥", "CNY"),
    ("CNY", "CNY"),
    ("C$", "CAD"),
    ("CAD", "CAD"),
    ("A$", "AUD"),
    ("AUD", "AUD"),
    ("NGN", "NGN"),
    ("EUR", "EUR"),
    ("GBP", "GBP"),
    ("JPY", "JPY"),
    ("CHF", "CHF"),
    ("₦", "NGN"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₣", "CHF"),
    ("$", "USD"),
];

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)")
            .expect("amount pattern is valid")
    })
}

/// Parse a numeric amount and optional currency code out of free text.
/// Pure: no network, no defaults applied. Thousands separators are stripped.
pub fn parse_price(text: &str) -> Option<(Decimal, Option<String>)> {
    let captures = amount_pattern().captures(text)?;
    let amount_str = captures.get(1)?.as_str().replace(',', "");
    let amount = Decimal::from_str(&amount_str).ok()?;

    let currency = CURRENCY_MARKERS
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|(_, code)| code.to_string());

    Some((amount, currency))
}

/// Converts parsed prices into the settlement currency. Rates are cached
/// process-wide; a dead rate source degrades to the fallback table, logged
/// but never an error.
pub struct CurrencyNormalizer {
    settlement_currency: String,
    source: Box<dyn RateSource>,
    fallback: HashMap<String, Decimal>,
    cache: RwLock<HashMap<String, Decimal>>,
}

impl CurrencyNormalizer {
    pub fn new(
        settlement_currency: String,
        source: Box<dyn RateSource>,
        fallback: HashMap<String, Decimal>,
    ) -> Self {
        Self {
            settlement_currency,
            source,
            fallback,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn settlement_currency(&self) -> &str {
        &self.settlement_currency
    }

    /// Normalize a raw price string to an amount in the settlement currency,
    /// rounded half-up to 2 decimal places. Any parse or conversion failure
    /// yields None; callers discard the record.
    pub async fn normalize(&self, price_text: &str) -> Option<Decimal> {
        let (amount, currency) = parse_price(price_text)?;
        let currency = currency.unwrap_or_else(|| self.settlement_currency.clone());

        if currency == self.settlement_currency {
            return Some(amount);
        }

        let rate = self.rate_for(&currency).await?;
        let converted = amount * rate;
        Some(converted.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    async fn rate_for(&self, currency: &str) -> Option<Decimal> {
        {
            let cache = self.cache.read().await;
            if let Some(rate) = cache.get(currency) {
                return Some(*rate);
            }
        }

        match self.source.get_rates(&self.settlement_currency).await {
            Ok(rates) => {
                let mut cache = self.cache.write().await;
                cache.extend(rates);
                if let Some(rate) = cache.get(currency) {
                    debug!(currency, rate = %rate, "cached live exchange rate");
                    return Some(*rate);
                }
            }
            Err(e) => {
                warn!(currency, error = %e, "rate source unavailable, using fallback table");
            }
        }

        self.fallback.get(currency).copied()
    }
}
