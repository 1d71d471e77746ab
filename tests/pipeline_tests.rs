// End-to-end pipeline tests: mock sites through scrape, change detection,
// alerting and deal detection, over in-memory storage.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dealwatch::config::{DealsConfig, FetcherConfig, ScraperConfig};
use dealwatch::currency::CurrencyNormalizer;
use dealwatch::deal_detector::DealDetector;
use dealwatch::fetcher::{Fetcher, UserAgentPool};
use dealwatch::manager::ScraperManager;
use dealwatch::models::{
    AlertRule, Category, CategoryHint, NewAlertRule, NewTrackedItem, RuleType, TrackedItem,
};
use dealwatch::rates::StaticRates;
use dealwatch::scraper::ItemScraper;
use dealwatch::storage::{MemoryStorage, Storage};

fn price(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn build_manager(storage: Arc<MemoryStorage>) -> ScraperManager {
    let fetcher_config = FetcherConfig {
        max_attempts: 1,
        base_backoff_secs: 0,
        politeness_delay_ms: 0,
        jitter_ms: 0,
        request_timeout_secs: 5,
    };
    let fetcher = Fetcher::new(fetcher_config, Arc::new(UserAgentPool::default())).unwrap();

    let mut rates = HashMap::new();
    rates.insert("USD".to_string(), Decimal::from(1500));
    let normalizer = CurrencyNormalizer::new(
        "NGN".to_string(),
        Box::new(StaticRates::new(rates.clone())),
        rates,
    );

    let scraper = ItemScraper::new(Arc::new(fetcher), Arc::new(normalizer));
    ScraperManager::new(
        storage,
        Arc::new(scraper),
        ScraperConfig {
            max_concurrent_scrapes: 4,
            batch_size: 10,
            batch_pause_ms: 0,
        },
    )
}

async fn serve_page(server: &MockServer, route: &str, name: &str, price_text: &str) {
    let html = format!(
        r#"<html><body>
        <h1 class="product-name">{}</h1>
        <span class="price">{}</span>
        <span class="availability">In Stock</span>
        </body></html>"#,
        name, price_text
    );
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

async fn seed_item(storage: &MemoryStorage, url: &str, category: Category) -> String {
    let item = TrackedItem::new(NewTrackedItem {
        url: url.to_string(),
        site: "test".to_string(),
        category,
        name: "Seeded".to_string(),
        current_price: None,
        currency: "NGN".to_string(),
        availability: None,
    });
    storage.insert_item(&item).await.unwrap();
    item.id
}

#[tokio::test]
async fn full_sweep_records_prices_and_history() {
    let server = MockServer::start().await;
    serve_page(&server, "/p/fan", "Ceiling Fan", "₦25,000.00").await;
    serve_page(&server, "/p/kettle", "Electric Kettle", "₦12,500.00").await;

    let storage = Arc::new(MemoryStorage::new());
    seed_item(&storage, &format!("{}/p/fan", server.uri()), Category::Ecommerce).await;
    seed_item(
        &storage,
        &format!("{}/p/kettle", server.uri()),
        Category::Ecommerce,
    )
    .await;

    let manager = build_manager(storage.clone());
    let outcome = manager.scrape_ecommerce_products().await.unwrap();

    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.updated, 2);
    assert_eq!(outcome.failed, 0);
    assert_eq!(storage.all_observations().await.len(), 2);

    let fan = storage
        .find_item_by_url(&format!("{}/p/fan", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fan.name, "Ceiling Fan");
    assert_eq!(fan.current_price, Some(price("25000.00")));
    assert_eq!(fan.availability, "In Stock");
}

#[tokio::test]
async fn foreign_currency_settles_before_storage() {
    let server = MockServer::start().await;
    serve_page(&server, "/p/import", "Imported Speaker", "US$20.00").await;

    let storage = Arc::new(MemoryStorage::new());
    let manager = build_manager(storage.clone());

    let item = manager
        .scrape_one(
            &format!("{}/p/import", server.uri()),
            CategoryHint::Fixed(Category::Ecommerce),
        )
        .await
        .unwrap()
        .unwrap();

    // 20 USD at 1500 NGN/USD
    assert_eq!(item.current_price, Some(price("30000.00")));
    assert_eq!(item.currency, "NGN");
}

#[tokio::test]
async fn price_drop_across_sweeps_fires_alert() {
    let server = MockServer::start().await;
    serve_page(&server, "/p/tv", "Smart TV 43in", "₦20,000").await;

    let storage = Arc::new(MemoryStorage::new());
    let url = format!("{}/p/tv", server.uri());
    let item_id = seed_item(&storage, &url, Category::Ecommerce).await;
    storage
        .add_rule(AlertRule::new(NewAlertRule {
            item_id: item_id.clone(),
            rule_type: RuleType::PriceDrop,
            threshold_value: None,
            percentage_threshold: Some(5.0),
            notification_method: None,
        }))
        .await;

    let manager = build_manager(storage.clone());
    manager.scrape_ecommerce_products().await.unwrap();
    assert!(storage.all_events().await.is_empty()); // first observation

    server.reset().await;
    serve_page(&server, "/p/tv", "Smart TV 43in", "₦18,000").await;
    manager.scrape_ecommerce_products().await.unwrap();

    let events = storage.all_events().await;
    assert_eq!(events.len(), 1);
    assert!(events[0].message.contains("10.0%"));
    assert!(!events[0].is_sent);
}

#[tokio::test]
async fn deal_detection_follows_sweep_history() {
    let server = MockServer::start().await;
    serve_page(&server, "/p/sofa", "3-Seater Sofa", "₦85,000").await;

    let storage = Arc::new(MemoryStorage::new());
    let url = format!("{}/p/sofa", server.uri());
    let item_id = seed_item(&storage, &url, Category::Ecommerce).await;

    // Earlier sweep saw the full price
    storage
        .add_observation_at(&item_id, price("100000"), Utc::now() - Duration::days(2))
        .await;

    let manager = build_manager(storage.clone());
    manager.scrape_ecommerce_products().await.unwrap();

    let detector = DealDetector::new(storage.clone(), DealsConfig::default());
    let deals = detector.detect_deals().await.unwrap();

    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].original_price, price("100000"));
    assert_eq!(deals[0].deal_price, price("85000"));
    assert_eq!(deals[0].discount_percent, 15.0);

    // A second pass refreshes rather than duplicates
    detector.detect_deals().await.unwrap();
    assert_eq!(storage.all_deals().await.len(), 1);
}

#[tokio::test]
async fn broken_page_leaves_other_items_untouched() {
    let server = MockServer::start().await;
    serve_page(&server, "/p/good", "Working Item", "₦5,000").await;
    Mock::given(method("GET"))
        .and(path("/p/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    seed_item(&storage, &format!("{}/p/good", server.uri()), Category::Ecommerce).await;
    seed_item(
        &storage,
        &format!("{}/p/broken", server.uri()),
        Category::Ecommerce,
    )
    .await;

    let manager = build_manager(storage.clone());
    let outcome = manager.scrape_ecommerce_products().await.unwrap();

    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.failed, 1);

    let good = storage
        .find_item_by_url(&format!("{}/p/good", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(good.current_price, Some(price("5000")));
}

#[tokio::test]
async fn categories_sweep_independently() {
    let server = MockServer::start().await;
    serve_page(&server, "/hotel/lagos", "Lagos Hotel Suite", "₦45,000").await;
    serve_page(&server, "/p/phone", "Budget Phone", "₦60,000").await;

    let storage = Arc::new(MemoryStorage::new());
    seed_item(
        &storage,
        &format!("{}/hotel/lagos", server.uri()),
        Category::Travel,
    )
    .await;
    seed_item(&storage, &format!("{}/p/phone", server.uri()), Category::Ecommerce).await;

    let manager = build_manager(storage.clone());
    let outcomes = manager.sweep_all().await.unwrap();

    assert_eq!(outcomes.len(), 4);
    let by_category: HashMap<Category, usize> = outcomes
        .iter()
        .map(|o| (o.category, o.updated))
        .collect();
    assert_eq!(by_category[&Category::Ecommerce], 1);
    assert_eq!(by_category[&Category::Travel], 1);
    assert_eq!(by_category[&Category::RealEstate], 0);
    assert_eq!(by_category[&Category::Utilities], 0);
}
