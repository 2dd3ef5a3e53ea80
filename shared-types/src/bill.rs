use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Typed view over a normalized bill record.
///
/// Only the fields most providers share are mapped; provider-specific
/// sections stay in the JSON record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NormalizedBill {
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub service_address: Option<String>,
    #[serde(default)]
    pub bill_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub service_period: Option<ServicePeriod>,
    #[serde(default)]
    pub previous_balance: Option<f64>,
    #[serde(default)]
    pub payments_received: Option<f64>,
    #[serde(default)]
    pub current_charges: Option<f64>,
    #[serde(default)]
    pub total_amount_due: Option<f64>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub meter: Option<MeterReading>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ServicePeriod {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MeterReading {
    #[serde(default)]
    pub meter_number: Option<String>,
    #[serde(default)]
    pub previous_read: Option<f64>,
    #[serde(default)]
    pub current_read: Option<f64>,
    #[serde(default)]
    pub usage: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl NormalizedBill {
    /// Build the typed view from a record. Fields of an unexpected type are
    /// dropped instead of failing the whole conversion.
    pub fn from_record(record: &serde_json::Value) -> Self {
        let Some(obj) = record.as_object() else {
            return Self::default();
        };

        let take = |key: &str| obj.get(key).cloned().unwrap_or(serde_json::Value::Null);

        Self {
            account_number: text(&take("account_number")),
            service_address: text(&take("service_address")),
            bill_date: text(&take("bill_date")),
            due_date: text(&take("due_date")),
            service_period: serde_json::from_value(take("service_period")).ok(),
            previous_balance: take("previous_balance").as_f64(),
            payments_received: take("payments_received").as_f64(),
            current_charges: take("current_charges").as_f64(),
            total_amount_due: take("total_amount_due").as_f64(),
            line_items: obj
                .get("line_items")
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| serde_json::from_value(item.clone()).ok())
                        .collect()
                })
                .unwrap_or_default(),
            meter: serde_json::from_value(take("meter")).ok(),
        }
    }
}

fn text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
