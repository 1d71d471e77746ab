use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{AlertEvent, AlertRule, NewAlertEvent, RuleType};
use crate::storage::Storage;

/// Drop percentage a deal_appeared rule requires; fixed, not configurable
/// per rule.
const DEAL_APPEARED_MIN_DROP: f64 = 10.0;

/// Default drop percentage for price_drop rules that set no threshold.
const DEFAULT_DROP_PERCENT: f64 = 5.0;

/// Evaluates every active rule on an item against the latest price movement
/// and persists one event per rule that fires. Rules never suppress each
/// other; three matching rules mean three events.
pub struct AlertEngine {
    storage: Arc<dyn Storage>,
}

fn drop_percent(previous: Decimal, current: Decimal) -> Option<f64> {
    if previous <= Decimal::ZERO || current >= previous {
        return None;
    }
    ((previous - current) / previous * Decimal::from(100)).to_f64()
}

impl AlertEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// `previous` is None on an item's first observation; percentage-based
    /// rules cannot fire then, but threshold rules can.
    pub async fn evaluate(
        &self,
        item_id: &str,
        current: Decimal,
        previous: Option<Decimal>,
    ) -> Result<Vec<AlertEvent>> {
        let rules = self.storage.list_active_rules(item_id).await?;
        let mut events = Vec::new();

        for rule in &rules {
            if let Some(message) = self.check(rule, current, previous) {
                info!(item_id, rule_id = %rule.id, %message, "alert rule fired");
                let event = self
                    .storage
                    .create_alert_event(NewAlertEvent {
                        rule_id: rule.id.clone(),
                        item_id: item_id.to_string(),
                        trigger_value: current,
                        message,
                    })
                    .await?;
                events.push(event);
            } else {
                debug!(item_id, rule_id = %rule.id, "alert rule did not fire");
            }
        }

        Ok(events)
    }

    fn check(&self, rule: &AlertRule, current: Decimal, previous: Option<Decimal>) -> Option<String> {
        match rule.rule_type {
            RuleType::PriceDrop => {
                let previous = previous?;
                let dropped = drop_percent(previous, current)?;
                let required = rule.percentage_threshold.unwrap_or(DEFAULT_DROP_PERCENT);
                (dropped >= required).then(|| {
                    format!(
                        "Price dropped {:.1}%: {} -> {}",
                        dropped, previous, current
                    )
                })
            }
            RuleType::Threshold => {
                let threshold = rule.threshold_value?;
                (current <= threshold).then(|| {
                    format!("Price {} reached threshold {}", current, threshold)
                })
            }
            RuleType::DealAppeared => {
                let previous = previous?;
                let dropped = drop_percent(previous, current)?;
                (dropped >= DEAL_APPEARED_MIN_DROP).then(|| {
                    format!(
                        "Deal appeared: {:.1}% off, {} -> {}",
                        dropped, previous, current
                    )
                })
            }
        }
    }
}
