//! Parsing of the amounts found in extracted bills.
//!
//! Extraction output mixes JSON numbers with strings such as `"$1,204.50"`,
//! `"(12.00)"` or `"35.10 CR"`. Parentheses, a leading minus, a trailing
//! minus and a `CR` suffix all mark a credit (negative amount).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<open>\()?\s*(?P<sign>-)?\s*\$?\s*(?P<sign2>-)?\s*(?P<digits>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?|\.\d+)\s*(?P<close>\))?\s*(?P<suffix>CR|-)?$",
    )
    .unwrap()
});

/// Amount read from a JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum AmountValue {
    Number(f64),
    Missing,
    Invalid(String),
}

pub fn parse_amount(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let caps = AMOUNT_RE.captures(trimmed)?;

    // Unbalanced parentheses are not an amount
    if caps.name("open").is_some() != caps.name("close").is_some() {
        return None;
    }

    let magnitude: f64 = caps.name("digits")?.as_str().replace(',', "").parse().ok()?;

    let negative = caps.name("open").is_some()
        || caps.name("sign").is_some()
        || caps.name("sign2").is_some()
        || caps.name("suffix").is_some();

    Some(if negative { -magnitude } else { magnitude })
}

pub fn amount_from_value(value: &Value) -> AmountValue {
    match value {
        Value::Null => AmountValue::Missing,
        Value::Number(n) => match n.as_f64() {
            Some(f) => AmountValue::Number(f),
            None => AmountValue::Invalid(n.to_string()),
        },
        Value::String(s) if s.trim().is_empty() => AmountValue::Missing,
        Value::String(s) => match parse_amount(s) {
            Some(f) => AmountValue::Number(f),
            None => AmountValue::Invalid(s.clone()),
        },
        other => AmountValue::Invalid(other.to_string()),
    }
}

pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Compares two amounts after rounding their difference to `places` decimals
pub fn within_tolerance(a: f64, b: f64, tolerance: f64, places: u32) -> bool {
    round_to((a - b).abs(), places) <= tolerance + 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_and_currency() {
        assert_eq!(parse_amount("12.5"), Some(12.5));
        assert_eq!(parse_amount(" $1,204.50 "), Some(1204.5));
        assert_eq!(parse_amount("$ 7"), Some(7.0));
        assert_eq!(parse_amount(".75"), Some(0.75));
    }

    #[test]
    fn test_parse_credits() {
        assert_eq!(parse_amount("(12.00)"), Some(-12.0));
        assert_eq!(parse_amount("-$3.25"), Some(-3.25));
        assert_eq!(parse_amount("$-3.25"), Some(-3.25));
        assert_eq!(parse_amount("35.10 CR"), Some(-35.1));
        assert_eq!(parse_amount("35.10cr"), Some(-35.1));
        assert_eq!(parse_amount("8.00-"), Some(-8.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount("(12.00"), None);
        assert_eq!(parse_amount("12.00 USD"), None);
        assert_eq!(parse_amount("1,23.4"), None);
    }

    #[test]
    fn test_amount_from_value() {
        assert_eq!(amount_from_value(&json!(4.2)), AmountValue::Number(4.2));
        assert_eq!(amount_from_value(&json!("$4.20")), AmountValue::Number(4.2));
        assert_eq!(amount_from_value(&json!(null)), AmountValue::Missing);
        assert_eq!(amount_from_value(&json!("  ")), AmountValue::Missing);
        assert_eq!(
            amount_from_value(&json!("pending")),
            AmountValue::Invalid("pending".to_string())
        );
        assert!(matches!(
            amount_from_value(&json!({"a": 1})),
            AmountValue::Invalid(_)
        ));
    }

    #[test]
    fn test_tolerance() {
        assert!(within_tolerance(100.0, 100.01, 0.01, 2));
        assert!(!within_tolerance(100.0, 100.02, 0.01, 2));
        // 0.1 + 0.2 style drift must not fail an exact comparison
        assert!(within_tolerance(0.1 + 0.2, 0.3, 0.0, 2));
        assert_eq!(round_to(12.345_6, 2), 12.35);
    }
}
