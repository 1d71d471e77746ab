use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::debug;

use crate::error::AppError;

/// Supplies exchange rates TO the settlement currency: one unit of the keyed
/// currency equals `rate` units of `base`.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn get_rates(&self, base: &str) -> Result<HashMap<String, Decimal>, AppError>;
}

/// Fixed in-memory rate table, used directly in tests and as the fallback
/// when the live source is unreachable.
pub struct StaticRates {
    rates: HashMap<String, Decimal>,
}

impl StaticRates {
    pub fn new(rates: HashMap<String, Decimal>) -> Self {
        Self { rates }
    }

    /// Conservative fallback rates into NGN. Stale by definition; used only
    /// when the live source is down, and the substitution is logged.
    pub fn ngn_fallback() -> Self {
        Self::new(ngn_fallback_table())
    }
}

#[async_trait]
impl RateSource for StaticRates {
    async fn get_rates(&self, _base: &str) -> Result<HashMap<String, Decimal>, AppError> {
        Ok(self.rates.clone())
    }
}

/// Last-resort NGN rates for the majors.
pub fn ngn_fallback_table() -> HashMap<String, Decimal> {
    let mut rates = HashMap::new();
    rates.insert("USD".to_string(), Decimal::from(1500));
    rates.insert("EUR".to_string(), Decimal::from(1620));
    rates.insert("GBP".to_string(), Decimal::from(1900));
    rates.insert("JPY".to_string(), Decimal::from(10));
    rates.insert("CAD".to_string(), Decimal::from(1100));
    rates.insert("AUD".to_string(), Decimal::from(980));
    rates.insert("CHF".to_string(), Decimal::from(1700));
    rates.insert("CNY".to_string(), Decimal::from(210));
    rates
}

#[derive(Debug, Deserialize)]
struct RateApiResponse {
    rates: HashMap<String, Decimal>,
}

/// Live rate source. The API reports how much of each currency one unit of
/// `base` buys; rates are inverted here so callers always multiply.
pub struct HttpRateSource {
    client: reqwest::Client,
    api_url: String,
}

impl HttpRateSource {
    pub fn new(api_url: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client, api_url })
    }

    async fn fetch(&self, base: &str) -> Result<RateApiResponse, AppError> {
        let url = format!("{}?base={}", self.api_url, base);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json::<RateApiResponse>().await?)
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn get_rates(&self, base: &str) -> Result<HashMap<String, Decimal>, AppError> {
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(2);
        let response = Retry::spawn(strategy, || self.fetch(base)).await?;

        let mut inverted = HashMap::new();
        for (code, rate) in response.rates {
            if rate > Decimal::ZERO {
                inverted.insert(code, Decimal::ONE / rate);
            }
        }
        debug!(base, count = inverted.len(), "fetched exchange rates");
        Ok(inverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_rates_returns_table() {
        let source = StaticRates::ngn_fallback();
        let rates = source.get_rates("NGN").await.unwrap();
        assert_eq!(rates.get("USD"), Some(&Decimal::from(1500)));
        assert!(rates.contains_key("CHF"));
    }

    #[tokio::test]
    async fn test_http_rates_are_inverted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("base", "NGN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base": "NGN",
                "rates": { "USD": 0.0008, "JPY": 0.1 }
            })))
            .mount(&server)
            .await;

        let source = HttpRateSource::new(format!("{}/latest", server.uri())).unwrap();
        let rates = source.get_rates("NGN").await.unwrap();

        // 1 USD = 1 / 0.0008 = 1250 NGN
        assert_eq!(rates.get("USD"), Some(&Decimal::from(1250)));
        assert_eq!(rates.get("JPY"), Some(&Decimal::from(10)));
    }

    #[tokio::test]
    async fn test_http_rates_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpRateSource::new(format!("{}/latest", server.uri())).unwrap();
        let result = source.get_rates("NGN").await;
        assert!(result.is_err());
    }
}
