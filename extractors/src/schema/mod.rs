//! Default-shape normalization.
//!
//! Extraction output only contains the keys the upstream parser happened to
//! find. `ensure_fields` fills every declared field that is missing so that
//! records from the same provider always share one shape, and coerces
//! string-typed scalars into the declared kind.

mod path;

pub use path::{FieldPath, Segment};

use crate::dates::parse_bill_date;
use crate::numeric::parse_amount;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use shared_types::{FieldKind, ReportIssue};

/// A declared field and its default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub path: FieldPath,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(path: FieldPath, kind: FieldKind) -> Self {
        Self {
            path,
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| kind_default(self.kind))
    }
}

pub fn kind_default(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Boolean => Value::Bool(false),
        FieldKind::List => Value::Array(Vec::new()),
        FieldKind::Object => Value::Object(Map::new()),
        FieldKind::Text | FieldKind::Number | FieldKind::Integer | FieldKind::Date => Value::Null,
    }
}

/// What `ensure_fields` changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeOutcome {
    pub filled: Vec<String>,
    pub coerced: Vec<String>,
    pub issues: Vec<ReportIssue>,
}

impl ShapeOutcome {
    /// Records an issue once; sibling fields under a bad parent report the same thing
    fn warn(&mut self, path: &str, message: impl Into<String>) {
        let message = message.into();
        if !self
            .issues
            .iter()
            .any(|i| i.path == path && i.message == message)
        {
            self.issues.push(ReportIssue::warning(path, message));
        }
    }
}

pub fn ensure_fields(record: &mut Value, fields: &[FieldSpec]) -> ShapeOutcome {
    let mut outcome = ShapeOutcome::default();
    for spec in fields {
        ensure_at(record, spec.path.segments(), spec, "", &mut outcome);
    }
    outcome
}

fn ensure_at(
    value: &mut Value,
    segments: &[Segment],
    spec: &FieldSpec,
    prefix: &str,
    out: &mut ShapeOutcome,
) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };

    let Some(obj) = value.as_object_mut() else {
        out.warn(display_prefix(prefix), "expected an object");
        return;
    };

    let here = join(prefix, &first.key);

    if first.each {
        let list = obj.entry(first.key.clone()).or_insert(Value::Null);
        if list.is_null() {
            *list = Value::Array(Vec::new());
            out.filled.push(here.clone());
        }
        let Some(items) = list.as_array_mut() else {
            out.warn(&here, "expected a list");
            return;
        };

        for (i, item) in items.iter_mut().enumerate() {
            let indexed = format!("{here}[{i}]");
            if rest.is_empty() {
                coerce(item, spec.kind, &indexed, out);
            } else {
                ensure_at(item, rest, spec, &indexed, out);
            }
        }
        return;
    }

    if rest.is_empty() {
        match obj.get_mut(&first.key) {
            None => {
                obj.insert(first.key.clone(), spec.default_value());
                out.filled.push(here);
            }
            Some(existing) if existing.is_null() && spec.kind.is_container() => {
                *existing = spec.default_value();
                out.filled.push(here);
            }
            Some(existing) => coerce(existing, spec.kind, &here, out),
        }
        return;
    }

    let child = obj
        .entry(first.key.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if child.is_null() {
        *child = Value::Object(Map::new());
    }
    ensure_at(child, rest, spec, &here, out);
}

fn coerce(value: &mut Value, kind: FieldKind, path: &str, out: &mut ShapeOutcome) {
    if value.is_null() {
        return;
    }

    let replacement = match (kind, &*value) {
        (FieldKind::Number, Value::Number(_)) => return,
        (FieldKind::Number, Value::String(s)) if s.trim().is_empty() => Some(Value::Null),
        (FieldKind::Number, Value::String(s)) => {
            parse_amount(s).and_then(Number::from_f64).map(Value::Number)
        }

        (FieldKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => return,
        (FieldKind::Integer, Value::Number(n)) => n.as_f64().and_then(whole_number),
        (FieldKind::Integer, Value::String(s)) if s.trim().is_empty() => Some(Value::Null),
        (FieldKind::Integer, Value::String(s)) => parse_amount(s).and_then(whole_number),

        (FieldKind::Date, Value::String(s)) if s.trim().is_empty() => Some(Value::Null),
        (FieldKind::Date, Value::String(s)) => {
            match parse_bill_date(s).map(|d| d.format("%Y-%m-%d").to_string()) {
                Some(iso) if iso == *s => return,
                Some(iso) => Some(Value::String(iso)),
                None => None,
            }
        }

        (FieldKind::Boolean, Value::Bool(_)) => return,
        (FieldKind::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" => Some(Value::Bool(true)),
            "no" | "n" | "false" => Some(Value::Bool(false)),
            _ => None,
        },

        (FieldKind::Text, Value::String(_)) => return,
        (FieldKind::Text, Value::Number(n)) => Some(Value::String(n.to_string())),

        (FieldKind::List, Value::Array(_)) => return,
        (FieldKind::Object, Value::Object(_)) => return,

        _ => None,
    };

    match replacement {
        Some(new_value) => {
            tracing::debug!("Coerced {} to {:?}", path, kind);
            *value = new_value;
            out.coerced.push(path.to_string());
        }
        None => out.warn(
            path,
            format!("expected {} but found {}", kind_name(kind), value),
        ),
    }
}

/// Integral values that fit in an i64; `as` would saturate anything larger
fn whole_number(f: f64) -> Option<Value> {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() != 0.0 || !(-BOUND..BOUND).contains(&f) {
        return None;
    }
    Some(Value::from(f as i64))
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text",
        FieldKind::Number => "a number",
        FieldKind::Integer => "an integer",
        FieldKind::Boolean => "a boolean",
        FieldKind::Date => "a date",
        FieldKind::List => "a list",
        FieldKind::Object => "an object",
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn display_prefix(prefix: &str) -> &str {
    if prefix.is_empty() {
        "$"
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(path: &str, kind: FieldKind) -> FieldSpec {
        FieldSpec::new(FieldPath::parse(path).unwrap(), kind)
    }

    #[test]
    fn test_fills_missing_fields() {
        let mut record = json!({"account_number": "A-100"});
        let fields = vec![
            spec("account_number", FieldKind::Text),
            spec("total_amount_due", FieldKind::Number),
            spec("autopay", FieldKind::Boolean),
            spec("line_items", FieldKind::List),
            spec("meter.current_read", FieldKind::Number),
            spec("adjustments", FieldKind::Number).with_default(json!(0.0)),
        ];

        let outcome = ensure_fields(&mut record, &fields);

        assert_eq!(
            record,
            json!({
                "account_number": "A-100",
                "total_amount_due": null,
                "autopay": false,
                "line_items": [],
                "meter": {"current_read": null},
                "adjustments": 0.0
            })
        );
        assert_eq!(
            outcome.filled,
            vec![
                "total_amount_due",
                "autopay",
                "line_items",
                "meter.current_read",
                "adjustments"
            ]
        );
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn test_fills_inside_each_list_element() {
        let mut record = json!({
            "line_items": [
                {"description": "Base charge", "amount": 12.0},
                {"amount": "3.50"}
            ]
        });
        let fields = vec![
            spec("line_items[].description", FieldKind::Text),
            spec("line_items[].amount", FieldKind::Number),
        ];

        let outcome = ensure_fields(&mut record, &fields);

        assert_eq!(record["line_items"][1]["description"], json!(null));
        assert_eq!(record["line_items"][1]["amount"], json!(3.5));
        assert_eq!(outcome.filled, vec!["line_items[1].description"]);
        assert_eq!(outcome.coerced, vec!["line_items[1].amount"]);
    }

    #[test]
    fn test_missing_list_becomes_empty() {
        let mut record = json!({"line_items": null});
        let outcome = ensure_fields(&mut record, &[spec("line_items[].amount", FieldKind::Number)]);
        assert_eq!(record, json!({"line_items": []}));
        assert_eq!(outcome.filled, vec!["line_items"]);
    }

    #[test]
    fn test_null_scalar_is_kept_null_container_is_filled() {
        let mut record = json!({"total_amount_due": null, "taxes": null});
        let outcome = ensure_fields(
            &mut record,
            &[
                spec("total_amount_due", FieldKind::Number).with_default(json!(0.0)),
                spec("taxes", FieldKind::List),
            ],
        );
        assert_eq!(record["total_amount_due"], json!(null));
        assert_eq!(record["taxes"], json!([]));
        assert_eq!(outcome.filled, vec!["taxes"]);
    }

    #[test]
    fn test_never_overwrites_existing_values() {
        let mut record = json!({"autopay": true, "notes": "paid online"});
        let outcome = ensure_fields(
            &mut record,
            &[
                spec("autopay", FieldKind::Boolean),
                spec("notes", FieldKind::Text).with_default(json!("")),
            ],
        );
        assert_eq!(record, json!({"autopay": true, "notes": "paid online"}));
        assert!(outcome.filled.is_empty());
    }

    #[test]
    fn test_wrong_intermediate_type_is_reported() {
        let mut record = json!({"meter": "M-22", "line_items": {"amount": 1}});
        let outcome = ensure_fields(
            &mut record,
            &[
                spec("meter.current_read", FieldKind::Number),
                spec("line_items[].amount", FieldKind::Number),
            ],
        );
        assert_eq!(record["meter"], json!("M-22"));
        assert_eq!(outcome.issues.len(), 2);
        assert_eq!(outcome.issues[0].path, "meter");
        assert_eq!(outcome.issues[1].path, "line_items");
    }

    #[test]
    fn test_coercions() {
        let mut record = json!({
            "account_number": 998877,
            "bill_date": "03/15/2024",
            "due_date": "2024-04-05",
            "autopay": "Yes",
            "days": "30",
            "total_amount_due": "(5.00)",
            "previous_balance": "",
            "payments_received": "see stub"
        });
        let outcome = ensure_fields(
            &mut record,
            &[
                spec("account_number", FieldKind::Text),
                spec("bill_date", FieldKind::Date),
                spec("due_date", FieldKind::Date),
                spec("autopay", FieldKind::Boolean),
                spec("days", FieldKind::Integer),
                spec("total_amount_due", FieldKind::Number),
                spec("previous_balance", FieldKind::Number),
                spec("payments_received", FieldKind::Number),
            ],
        );

        assert_eq!(record["account_number"], json!("998877"));
        assert_eq!(record["bill_date"], json!("2024-03-15"));
        assert_eq!(record["due_date"], json!("2024-04-05"));
        assert_eq!(record["autopay"], json!(true));
        assert_eq!(record["days"], json!(30));
        assert_eq!(record["total_amount_due"], json!(-5.0));
        assert_eq!(record["previous_balance"], json!(null));
        assert_eq!(record["payments_received"], json!("see stub"));

        assert!(!outcome.coerced.contains(&"due_date".to_string()));
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].path, "payments_received");
    }

    #[test]
    fn test_out_of_range_integer_is_not_coerced() {
        let mut record = json!({"service_period": {"days": "99999999999999999999"}});
        let outcome = ensure_fields(&mut record, &[spec("service_period.days", FieldKind::Integer)]);

        assert_eq!(record["service_period"]["days"], json!("99999999999999999999"));
        assert!(outcome.coerced.is_empty());
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].path, "service_period.days");
        assert!(outcome.issues[0].message.starts_with("expected an integer"));

        let mut record = json!({"days": 1e20, "units": 12.0});
        let outcome = ensure_fields(
            &mut record,
            &[spec("days", FieldKind::Integer), spec("units", FieldKind::Integer)],
        );
        assert_eq!(record["days"], json!(1e20));
        assert_eq!(record["units"], json!(12));
        assert_eq!(outcome.coerced, vec!["units"]);
        assert_eq!(outcome.issues.len(), 1);
    }

    #[test]
    fn test_object_kind_default() {
        let mut record = json!({"adjustments": null});
        let outcome = ensure_fields(
            &mut record,
            &[
                spec("adjustments", FieldKind::Object),
                spec("taxes", FieldKind::Object),
            ],
        );
        assert_eq!(record, json!({"adjustments": {}, "taxes": {}}));
        assert_eq!(outcome.filled, vec!["adjustments", "taxes"]);
    }

    #[test]
    fn test_boolean_coercion_of_negatives() {
        let mut record = json!({"autopay": "no", "paperless": "FALSE", "budget_billing": "maybe"});
        let outcome = ensure_fields(
            &mut record,
            &[
                spec("autopay", FieldKind::Boolean),
                spec("paperless", FieldKind::Boolean),
                spec("budget_billing", FieldKind::Boolean),
            ],
        );
        assert_eq!(record["autopay"], json!(false));
        assert_eq!(record["paperless"], json!(false));
        assert_eq!(record["budget_billing"], json!("maybe"));
        assert_eq!(outcome.coerced, vec!["autopay", "paperless"]);
        assert_eq!(outcome.issues.len(), 1);
    }

    #[test]
    fn test_bad_parent_reported_once() {
        let mut record = json!({"meter": "M-22"});
        let outcome = ensure_fields(
            &mut record,
            &[
                spec("meter.previous_read", FieldKind::Number),
                spec("meter.current_read", FieldKind::Number),
                spec("meter.usage", FieldKind::Number),
            ],
        );
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].path, "meter");
        assert_eq!(outcome.issues[0].message, "expected an object");
    }

    #[test]
    fn test_terminal_list_elements_are_coerced() {
        let mut record = json!({"taxes": ["1.20", 0.5]});
        let outcome = ensure_fields(&mut record, &[spec("taxes[]", FieldKind::Number)]);
        assert_eq!(record["taxes"], json!([1.2, 0.5]));
        assert_eq!(outcome.coerced, vec!["taxes[0]"]);
    }
}
