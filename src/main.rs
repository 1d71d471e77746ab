use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use dealwatch::config::AppConfig;
use dealwatch::currency::CurrencyNormalizer;
use dealwatch::deal_detector::DealDetector;
use dealwatch::fetcher::{Fetcher, UserAgentPool};
use dealwatch::manager::ScraperManager;
use dealwatch::models::{Category, CategoryHint};
use dealwatch::rates::{ngn_fallback_table, HttpRateSource, RateSource, StaticRates};
use dealwatch::scraper::ItemScraper;
use dealwatch::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "dealwatch", about = "Price tracking and deal detection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler: periodic sweeps plus deal detection
    Serve,
    /// Run one sweep and exit; all categories unless one is given
    Sweep {
        /// ecommerce, travel, real_estate or utilities
        category: Option<String>,
    },
    /// Run one deal detection pass and exit
    DetectDeals,
    /// Scrape a single URL, registering it if new
    Scrape { url: String },
}

struct App {
    manager: Arc<ScraperManager>,
    deal_detector: Arc<DealDetector>,
}

async fn build_app(config: &AppConfig) -> Result<App> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.database.acquire_timeout))
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    let sqlite = SqliteStorage::new(pool);
    sqlite.migrate().await.context("failed to run migrations")?;
    let storage: Arc<dyn Storage> = Arc::new(sqlite);

    let fetcher = Fetcher::new(config.fetcher.clone(), Arc::new(UserAgentPool::default()))
        .context("failed to build fetcher")?;

    let settlement = config.currency.settlement_currency.clone();
    let fallback = if settlement == "NGN" {
        ngn_fallback_table()
    } else {
        HashMap::new()
    };
    let source: Box<dyn RateSource> = match &config.currency.rate_api_url {
        Some(url) => Box::new(HttpRateSource::new(url.clone())?),
        None => Box::new(StaticRates::new(fallback.clone())),
    };
    let normalizer = CurrencyNormalizer::new(settlement, source, fallback);

    let scraper = ItemScraper::new(Arc::new(fetcher), Arc::new(normalizer));
    let manager = Arc::new(ScraperManager::new(
        storage.clone(),
        Arc::new(scraper),
        config.scraper.clone(),
    ));
    let deal_detector = Arc::new(DealDetector::new(storage.clone(), config.deals.clone()));

    Ok(App {
        manager,
        deal_detector,
    })
}

async fn serve(config: &AppConfig, app: App) -> Result<()> {
    let scheduler = JobScheduler::new().await?;

    let manager = app.manager.clone();
    let sweep_job = Job::new_async(config.scheduler.sweep_interval.as_str(), move |_uuid, _l| {
        let manager = manager.clone();
        Box::pin(async move {
            if let Err(e) = manager.sweep_all().await {
                tracing::error!(error = %e, "scheduled sweep failed");
            }
        })
    })?;
    scheduler.add(sweep_job).await?;

    let detector = app.deal_detector.clone();
    let deal_job = Job::new_async(
        config.scheduler.deal_detection_interval.as_str(),
        move |_uuid, _l| {
            let detector = detector.clone();
            Box::pin(async move {
                if let Err(e) = detector.detect_deals().await {
                    tracing::error!(error = %e, "scheduled deal detection failed");
                }
            })
        },
    )?;
    scheduler.add(deal_job).await?;

    scheduler.start().await?;
    info!(
        sweep = %config.scheduler.sweep_interval,
        deals = %config.scheduler.deal_detection_interval,
        "scheduler running"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dealwatch=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load configuration")?;
    let app = build_app(&config).await?;

    match cli.command {
        Command::Serve => serve(&config, app).await?,
        Command::Sweep { category } => {
            let outcomes = match category {
                Some(raw) => {
                    let category = Category::parse(&raw)
                        .with_context(|| format!("unknown category '{}'", raw))?;
                    vec![app.manager.sweep_category(category).await?]
                }
                None => app.manager.sweep_all().await?,
            };
            for outcome in outcomes {
                info!(
                    category = outcome.category.as_str(),
                    attempted = outcome.attempted,
                    updated = outcome.updated,
                    failed = outcome.failed,
                    "sweep outcome"
                );
            }
        }
        Command::DetectDeals => {
            let deals = app.deal_detector.detect_deals().await?;
            info!(count = deals.len(), "deal detection complete");
        }
        Command::Scrape { url } => {
            match app.manager.scrape_one(&url, CategoryHint::Auto).await? {
                Some(item) => {
                    info!(item_id = %item.id, name = %item.name, price = ?item.current_price, "scraped");
                }
                None => info!(%url, "no valid record"),
            }
        }
    }

    Ok(())
}
