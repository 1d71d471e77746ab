use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub fetcher: FetcherConfig,
    pub scraper: ScraperConfig,
    pub currency: CurrencyConfig,
    pub deals: DealsConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
    pub politeness_delay_ms: u64,
    pub jitter_ms: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub max_concurrent_scrapes: usize,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    pub settlement_currency: String,
    pub rate_api_url: Option<String>,
}

/// Minimum discount percent per category before a Deal is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealsConfig {
    pub lookback_days: i64,
    pub ecommerce_min_discount: f64,
    pub travel_min_discount: f64,
    pub real_estate_min_discount: f64,
    pub utilities_min_discount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub sweep_interval: String,
    pub deal_detection_interval: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables: DEALWATCH__SECTION__KEY
            .add_source(
                Environment::with_prefix("DEALWATCH")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message(
                "Database min_connections cannot exceed max_connections".into(),
            ));
        }

        if self.fetcher.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Fetcher max_attempts must be greater than 0".into(),
            ));
        }

        if self.fetcher.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Fetcher request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.scraper.max_concurrent_scrapes == 0 {
            return Err(ConfigError::Message(
                "Scraper max_concurrent_scrapes must be greater than 0".into(),
            ));
        }

        if self.scraper.batch_size == 0 {
            return Err(ConfigError::Message(
                "Scraper batch_size must be greater than 0".into(),
            ));
        }

        if self.currency.settlement_currency.len() != 3 {
            return Err(ConfigError::Message(
                "Settlement currency must be a 3-letter ISO code".into(),
            ));
        }

        if self.deals.lookback_days <= 0 {
            return Err(ConfigError::Message(
                "Deals lookback_days must be greater than 0".into(),
            ));
        }

        for (name, value) in [
            ("ecommerce_min_discount", self.deals.ecommerce_min_discount),
            ("travel_min_discount", self.deals.travel_min_discount),
            (
                "real_estate_min_discount",
                self.deals.real_estate_min_discount,
            ),
            ("utilities_min_discount", self.deals.utilities_min_discount),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Message(format!(
                    "Deals {} must be between 0 and 100",
                    name
                )));
            }
        }

        if !Self::is_valid_cron(&self.scheduler.sweep_interval)
            || !Self::is_valid_cron(&self.scheduler.deal_detection_interval)
        {
            return Err(ConfigError::Message(
                "Invalid cron expression in scheduler configuration".into(),
            ));
        }

        Ok(())
    }

    fn is_valid_cron(cron_expr: &str) -> bool {
        // Basic cron validation - should have 5 parts (minute hour day month weekday)
        let parts: Vec<&str> = cron_expr.split_whitespace().collect();
        if parts.len() != 5 {
            return false;
        }

        for part in parts {
            if part.is_empty() {
                return false;
            }
            // Allow numbers, ranges, lists, and wildcards
            if !part
                .chars()
                .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/')
            {
                return false;
            }
        }

        true
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_secs: 1,
            politeness_delay_ms: 500,
            jitter_ms: 500,
            request_timeout_secs: 30,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scrapes: 10,
            batch_size: 50,
            batch_pause_ms: 2000,
        }
    }
}

impl Default for DealsConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            ecommerce_min_discount: 10.0,
            travel_min_discount: 15.0,
            real_estate_min_discount: 5.0,
            utilities_min_discount: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout: 30,
            },
            fetcher: FetcherConfig::default(),
            scraper: ScraperConfig::default(),
            currency: CurrencyConfig {
                settlement_currency: "NGN".to_string(),
                rate_api_url: None,
            },
            deals: DealsConfig::default(),
            scheduler: SchedulerConfig {
                sweep_interval: "0 */6 * * *".to_string(),
                deal_detection_interval: "30 */6 * * *".to_string(),
            },
        }
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_db_connections() {
        let mut config = valid_config();
        config.database.min_connections = 15;
        config.database.max_connections = 10;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("min_connections cannot exceed max_connections"));
    }

    #[test]
    fn test_config_validation_zero_attempts() {
        let mut config = valid_config();
        config.fetcher.max_attempts = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("max_attempts must be greater than 0"));
    }

    #[test]
    fn test_config_validation_bad_settlement_currency() {
        let mut config = valid_config();
        config.currency.settlement_currency = "NAIRA".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("3-letter ISO code"));
    }

    #[test]
    fn test_config_validation_discount_out_of_range() {
        let mut config = valid_config();
        config.deals.travel_min_discount = 120.0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("travel_min_discount must be between 0 and 100"));
    }

    #[test]
    fn test_config_validation_invalid_cron() {
        let mut config = valid_config();
        config.scheduler.sweep_interval = "whenever".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid cron expression"));
    }

    #[test]
    fn test_cron_validation() {
        assert!(AppConfig::is_valid_cron("0 0 * * *"));
        assert!(AppConfig::is_valid_cron("*/15 * * * *"));
        assert!(AppConfig::is_valid_cron("0 9-17 * * 1-5"));

        assert!(!AppConfig::is_valid_cron("invalid"));
        assert!(!AppConfig::is_valid_cron("0 0 * *")); // Too few parts
        assert!(!AppConfig::is_valid_cron("0 0 * * * *")); // Too many parts
    }

    #[test]
    fn test_env_override_uses_double_underscore_prefix() {
        std::env::set_var("DEALWATCH__CURRENCY__SETTLEMENT_CURRENCY", "USD");

        let settings = Config::builder()
            .add_source(
                Environment::with_prefix("DEALWATCH")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .unwrap();

        assert_eq!(
            settings.get_string("currency.settlement_currency").unwrap(),
            "USD"
        );

        std::env::remove_var("DEALWATCH__CURRENCY__SETTLEMENT_CURRENCY");
    }

    #[test]
    fn test_default_thresholds() {
        let deals = DealsConfig::default();
        assert_eq!(deals.lookback_days, 7);
        assert_eq!(deals.ecommerce_min_discount, 10.0);
        assert_eq!(deals.travel_min_discount, 15.0);
    }
}
