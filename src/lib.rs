pub mod alert_engine;
pub mod change_detector;
pub mod config;
pub mod currency;
pub mod deal_detector;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod manager;
pub mod models;
pub mod rates;
pub mod scraper;
pub mod sites;
pub mod storage;

pub use config::AppConfig;
pub use error::{AppError, Result};
