use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    AlertEvent, AlertRule, Category, Deal, DealFields, ItemFieldUpdate, NewAlertEvent,
    PriceObservation, RuleType, TrackedItem,
};

/// Persistence boundary for the pipeline. Every call is transactional; the
/// pipeline owns no storage of its own.
#[async_trait]
pub trait Storage: Send + Sync {
    /// All items in `category` that are tracked and active.
    async fn get_tracked_items(&self, category: Category) -> Result<Vec<TrackedItem>>;

    async fn find_item_by_url(&self, url: &str) -> Result<Option<TrackedItem>>;

    async fn insert_item(&self, item: &TrackedItem) -> Result<()>;

    async fn update_item_fields(&self, item_id: &str, update: ItemFieldUpdate) -> Result<()>;

    async fn get_latest_observation(&self, item_id: &str) -> Result<Option<PriceObservation>>;

    async fn get_observations_since(
        &self,
        item_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>>;

    async fn append_observation(&self, observation: &PriceObservation) -> Result<()>;

    /// Atomic unit: the item row update and its history row commit together,
    /// so a "latest price" read never sees one without the other.
    async fn update_item_with_observation(
        &self,
        item_id: &str,
        update: ItemFieldUpdate,
        observation: PriceObservation,
    ) -> Result<()>;

    async fn get_active_deal(&self, item_id: &str, category: Category) -> Result<Option<Deal>>;

    /// Update the active deal for the item in place, or insert one.
    async fn upsert_deal(&self, item_id: &str, fields: DealFields) -> Result<Deal>;

    async fn list_active_rules(&self, item_id: &str) -> Result<Vec<AlertRule>>;

    async fn create_alert_event(&self, fields: NewAlertEvent) -> Result<AlertEvent>;

    async fn mark_event_sent(&self, event_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// SQLite implementation

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Rules are authored outside the pipeline; this is the write path the
    /// rule-management surface uses.
    pub async fn insert_rule(&self, rule: &AlertRule) -> Result<()> {
        sqlx::query(
            "INSERT INTO alert_rules
             (id, item_id, rule_type, threshold_value, percentage_threshold,
              notification_method, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule.id)
        .bind(&rule.item_id)
        .bind(rule_type_str(rule.rule_type))
        .bind(rule.threshold_value.map(|t| t.to_string()))
        .bind(rule.percentage_threshold)
        .bind(&rule.notification_method)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| AppError::Persistence(format!("bad decimal '{}' in row: {}", raw, e)))
}

fn parse_category(raw: &str) -> Result<Category> {
    Category::parse(raw)
        .ok_or_else(|| AppError::Persistence(format!("unknown category '{}' in row", raw)))
}

fn item_from_row(row: &SqliteRow) -> Result<TrackedItem> {
    let price: Option<String> = row.try_get("current_price")?;
    Ok(TrackedItem {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        site: row.try_get("site")?,
        category: parse_category(row.try_get::<String, _>("category")?.as_str())?,
        name: row.try_get("name")?,
        current_price: price.as_deref().map(parse_decimal).transpose()?,
        currency: row.try_get("currency")?,
        availability: row.try_get("availability")?,
        is_tracked: row.try_get("is_tracked")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn observation_from_row(row: &SqliteRow) -> Result<PriceObservation> {
    Ok(PriceObservation {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        amount: parse_decimal(row.try_get::<String, _>("amount")?.as_str())?,
        currency: row.try_get("currency")?,
        availability: row.try_get("availability")?,
        source: row.try_get("source")?,
        observed_at: row.try_get("observed_at")?,
    })
}

fn deal_from_row(row: &SqliteRow) -> Result<Deal> {
    Ok(Deal {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        category: parse_category(row.try_get::<String, _>("category")?.as_str())?,
        original_price: parse_decimal(row.try_get::<String, _>("original_price")?.as_str())?,
        deal_price: parse_decimal(row.try_get::<String, _>("deal_price")?.as_str())?,
        discount_percent: row.try_get("discount_percent")?,
        deal_type: row.try_get("deal_type")?,
        description: row.try_get("description")?,
        valid_from: row.try_get("valid_from")?,
        valid_until: row.try_get("valid_until")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn rule_from_row(row: &SqliteRow) -> Result<AlertRule> {
    let rule_type: String = row.try_get("rule_type")?;
    let rule_type = match rule_type.as_str() {
        "price_drop" => RuleType::PriceDrop,
        "threshold" => RuleType::Threshold,
        "deal_appeared" => RuleType::DealAppeared,
        other => {
            return Err(AppError::Persistence(format!(
                "unknown rule type '{}' in row",
                other
            )))
        }
    };
    let threshold: Option<String> = row.try_get("threshold_value")?;
    Ok(AlertRule {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        rule_type,
        threshold_value: threshold.as_deref().map(parse_decimal).transpose()?,
        percentage_threshold: row.try_get("percentage_threshold")?,
        notification_method: row.try_get("notification_method")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn rule_type_str(rule_type: RuleType) -> &'static str {
    match rule_type {
        RuleType::PriceDrop => "price_drop",
        RuleType::Threshold => "threshold",
        RuleType::DealAppeared => "deal_appeared",
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_tracked_items(&self, category: Category) -> Result<Vec<TrackedItem>> {
        let rows = sqlx::query(
            "SELECT * FROM tracked_items
             WHERE category = ? AND is_tracked = 1 AND is_active = 1
             ORDER BY created_at",
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    async fn find_item_by_url(&self, url: &str) -> Result<Option<TrackedItem>> {
        let row = sqlx::query("SELECT * FROM tracked_items WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn insert_item(&self, item: &TrackedItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO tracked_items
             (id, url, site, category, name, current_price, currency, availability,
              is_tracked, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.url)
        .bind(&item.site)
        .bind(item.category.as_str())
        .bind(&item.name)
        .bind(item.current_price.map(|p| p.to_string()))
        .bind(&item.currency)
        .bind(&item.availability)
        .bind(item.is_tracked)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_item_fields(&self, item_id: &str, update: ItemFieldUpdate) -> Result<()> {
        sqlx::query(
            "UPDATE tracked_items SET
             name = COALESCE(?, name),
             current_price = COALESCE(?, current_price),
             availability = COALESCE(?, availability),
             updated_at = ?
             WHERE id = ?",
        )
        .bind(update.name)
        .bind(update.price.map(|p| p.to_string()))
        .bind(update.availability)
        .bind(Utc::now())
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_latest_observation(&self, item_id: &str) -> Result<Option<PriceObservation>> {
        let row = sqlx::query(
            "SELECT * FROM price_observations
             WHERE item_id = ? ORDER BY observed_at DESC LIMIT 1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(observation_from_row).transpose()
    }

    async fn get_observations_since(
        &self,
        item_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>> {
        let rows = sqlx::query(
            "SELECT * FROM price_observations
             WHERE item_id = ? AND observed_at >= ?
             ORDER BY observed_at DESC",
        )
        .bind(item_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(observation_from_row).collect()
    }

    async fn append_observation(&self, observation: &PriceObservation) -> Result<()> {
        sqlx::query(
            "INSERT INTO price_observations
             (id, item_id, amount, currency, availability, source, observed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&observation.id)
        .bind(&observation.item_id)
        .bind(observation.amount.to_string())
        .bind(&observation.currency)
        .bind(&observation.availability)
        .bind(&observation.source)
        .bind(observation.observed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_item_with_observation(
        &self,
        item_id: &str,
        update: ItemFieldUpdate,
        observation: PriceObservation,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE tracked_items SET
             name = COALESCE(?, name),
             current_price = COALESCE(?, current_price),
             availability = COALESCE(?, availability),
             updated_at = ?
             WHERE id = ?",
        )
        .bind(update.name)
        .bind(update.price.map(|p| p.to_string()))
        .bind(update.availability)
        .bind(Utc::now())
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO price_observations
             (id, item_id, amount, currency, availability, source, observed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&observation.id)
        .bind(&observation.item_id)
        .bind(observation.amount.to_string())
        .bind(&observation.currency)
        .bind(&observation.availability)
        .bind(&observation.source)
        .bind(observation.observed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_active_deal(&self, item_id: &str, category: Category) -> Result<Option<Deal>> {
        let row = sqlx::query(
            "SELECT * FROM deals
             WHERE item_id = ? AND category = ? AND is_active = 1",
        )
        .bind(item_id)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(deal_from_row).transpose()
    }

    async fn upsert_deal(&self, item_id: &str, fields: DealFields) -> Result<Deal> {
        if let Some(mut existing) = self.get_active_deal(item_id, fields.category).await? {
            existing.refresh(fields);
            sqlx::query(
                "UPDATE deals SET
                 original_price = ?, deal_price = ?, discount_percent = ?,
                 deal_type = ?, description = ?, valid_from = ?, valid_until = ?,
                 updated_at = ?
                 WHERE id = ?",
            )
            .bind(existing.original_price.to_string())
            .bind(existing.deal_price.to_string())
            .bind(existing.discount_percent)
            .bind(&existing.deal_type)
            .bind(&existing.description)
            .bind(existing.valid_from)
            .bind(existing.valid_until)
            .bind(existing.updated_at)
            .bind(&existing.id)
            .execute(&self.pool)
            .await?;
            return Ok(existing);
        }

        let deal = Deal::new(item_id.to_string(), fields);
        sqlx::query(
            "INSERT INTO deals
             (id, item_id, category, original_price, deal_price, discount_percent,
              deal_type, description, valid_from, valid_until, is_active,
              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&deal.id)
        .bind(&deal.item_id)
        .bind(deal.category.as_str())
        .bind(deal.original_price.to_string())
        .bind(deal.deal_price.to_string())
        .bind(deal.discount_percent)
        .bind(&deal.deal_type)
        .bind(&deal.description)
        .bind(deal.valid_from)
        .bind(deal.valid_until)
        .bind(deal.is_active)
        .bind(deal.created_at)
        .bind(deal.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(deal)
    }

    async fn list_active_rules(&self, item_id: &str) -> Result<Vec<AlertRule>> {
        let rows = sqlx::query(
            "SELECT * FROM alert_rules WHERE item_id = ? AND is_active = 1",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn create_alert_event(&self, fields: NewAlertEvent) -> Result<AlertEvent> {
        let event = AlertEvent::new(fields);
        sqlx::query(
            "INSERT INTO alert_events
             (id, rule_id, item_id, trigger_value, message, is_sent, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.rule_id)
        .bind(&event.item_id)
        .bind(event.trigger_value.to_string())
        .bind(&event.message)
        .bind(event.is_sent)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(event)
    }

    async fn mark_event_sent(&self, event_id: &str) -> Result<()> {
        sqlx::query("UPDATE alert_events SET is_sent = 1 WHERE id = ?")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation, for tests and local experimentation

#[derive(Default)]
struct MemoryInner {
    items: HashMap<String, TrackedItem>,
    observations: Vec<PriceObservation>,
    deals: Vec<Deal>,
    rules: Vec<AlertRule>,
    events: Vec<AlertEvent>,
}

/// Storage backed by plain collections behind one async mutex. Fresh state
/// per instance; nothing global.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_rule(&self, rule: AlertRule) {
        self.inner.lock().await.rules.push(rule);
    }

    pub async fn all_events(&self) -> Vec<AlertEvent> {
        self.inner.lock().await.events.clone()
    }

    pub async fn all_deals(&self) -> Vec<Deal> {
        self.inner.lock().await.deals.clone()
    }

    pub async fn all_observations(&self) -> Vec<PriceObservation> {
        self.inner.lock().await.observations.clone()
    }

    pub async fn get_item(&self, item_id: &str) -> Option<TrackedItem> {
        self.inner.lock().await.items.get(item_id).cloned()
    }

    /// Backdate an observation, for exercising lookback windows in tests.
    pub async fn add_observation_at(
        &self,
        item_id: &str,
        amount: Decimal,
        observed_at: DateTime<Utc>,
    ) {
        let mut obs = PriceObservation::new(
            item_id.to_string(),
            amount,
            "NGN".to_string(),
            "Unknown".to_string(),
        );
        obs.observed_at = observed_at;
        self.inner.lock().await.observations.push(obs);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_tracked_items(&self, category: Category) -> Result<Vec<TrackedItem>> {
        let inner = self.inner.lock().await;
        let mut items: Vec<TrackedItem> = inner
            .items
            .values()
            .filter(|i| i.category == category && i.is_tracked && i.is_active)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn find_item_by_url(&self, url: &str) -> Result<Option<TrackedItem>> {
        let inner = self.inner.lock().await;
        Ok(inner.items.values().find(|i| i.url == url).cloned())
    }

    async fn insert_item(&self, item: &TrackedItem) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn update_item_fields(&self, item_id: &str, update: ItemFieldUpdate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let item = inner
            .items
            .get_mut(item_id)
            .ok_or_else(|| AppError::Persistence(format!("no item {}", item_id)))?;
        item.apply_update(update);
        Ok(())
    }

    async fn get_latest_observation(&self, item_id: &str) -> Result<Option<PriceObservation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .observations
            .iter()
            .filter(|o| o.item_id == item_id)
            .max_by_key(|o| o.observed_at)
            .cloned())
    }

    async fn get_observations_since(
        &self,
        item_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>> {
        let inner = self.inner.lock().await;
        let mut observations: Vec<PriceObservation> = inner
            .observations
            .iter()
            .filter(|o| o.item_id == item_id && o.observed_at >= since)
            .cloned()
            .collect();
        observations.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        Ok(observations)
    }

    async fn append_observation(&self, observation: &PriceObservation) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.observations.push(observation.clone());
        Ok(())
    }

    async fn update_item_with_observation(
        &self,
        item_id: &str,
        update: ItemFieldUpdate,
        observation: PriceObservation,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let item = inner
            .items
            .get_mut(item_id)
            .ok_or_else(|| AppError::Persistence(format!("no item {}", item_id)))?;
        item.apply_update(update);
        inner.observations.push(observation);
        Ok(())
    }

    async fn get_active_deal(&self, item_id: &str, category: Category) -> Result<Option<Deal>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .deals
            .iter()
            .find(|d| d.item_id == item_id && d.category == category && d.is_active)
            .cloned())
    }

    async fn upsert_deal(&self, item_id: &str, fields: DealFields) -> Result<Deal> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner
            .deals
            .iter_mut()
            .find(|d| d.item_id == item_id && d.category == fields.category && d.is_active)
        {
            existing.refresh(fields);
            return Ok(existing.clone());
        }
        let deal = Deal::new(item_id.to_string(), fields);
        inner.deals.push(deal.clone());
        Ok(deal)
    }

    async fn list_active_rules(&self, item_id: &str) -> Result<Vec<AlertRule>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rules
            .iter()
            .filter(|r| r.item_id == item_id && r.is_active)
            .cloned()
            .collect())
    }

    async fn create_alert_event(&self, fields: NewAlertEvent) -> Result<AlertEvent> {
        let mut inner = self.inner.lock().await;
        let event = AlertEvent::new(fields);
        inner.events.push(event.clone());
        Ok(event)
    }

    async fn mark_event_sent(&self, event_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(event) = inner.events.iter_mut().find(|e| e.id == event_id) {
            event.is_sent = true;
        }
        Ok(())
    }
}
