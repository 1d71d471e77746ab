use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{generate_id, RuleType};

/// A user- or system-defined trigger bound to a tracked item. Created by the
/// API layer; read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRule {
    pub id: String,
    pub item_id: String,
    pub rule_type: RuleType,
    pub threshold_value: Option<Decimal>,
    pub percentage_threshold: Option<f64>,
    pub notification_method: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlertRule {
    pub item_id: String,
    pub rule_type: RuleType,
    pub threshold_value: Option<Decimal>,
    pub percentage_threshold: Option<f64>,
    pub notification_method: Option<String>,
}

/// One firing of an AlertRule. Never deleted; the notification collaborator
/// marks it sent after delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub id: String,
    pub rule_id: String,
    pub item_id: String,
    pub trigger_value: Decimal,
    pub message: String,
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlertEvent {
    pub rule_id: String,
    pub item_id: String,
    pub trigger_value: Decimal,
    pub message: String,
}

impl AlertRule {
    pub fn new(new_rule: NewAlertRule) -> Self {
        Self {
            id: generate_id(),
            item_id: new_rule.item_id,
            rule_type: new_rule.rule_type,
            threshold_value: new_rule.threshold_value,
            percentage_threshold: new_rule.percentage_threshold,
            notification_method: new_rule
                .notification_method
                .unwrap_or_else(|| "console".to_string()),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

impl AlertEvent {
    pub fn new(fields: NewAlertEvent) -> Self {
        Self {
            id: generate_id(),
            rule_id: fields.rule_id,
            item_id: fields.item_id,
            trigger_value: fields.trigger_value,
            message: fields.message,
            is_sent: false,
            created_at: Utc::now(),
        }
    }
}
