//! Recomputes derived totals and compares them with the extracted ones.

use crate::numeric::{amount_from_value, round_to, within_tolerance, AmountValue};
use crate::schema::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use shared_types::{AmountUnit, CheckStatus, ReconciliationCheck, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sign {
    #[default]
    Add,
    Subtract,
}

impl Sign {
    fn factor(self) -> f64 {
        match self {
            Sign::Add => 1.0,
            Sign::Subtract => -1.0,
        }
    }
}

/// One component of a recomputed total. A `[]` path adds up every value it reaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub path: FieldPath,
    #[serde(default)]
    pub sign: Sign,
}

fn default_precision() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRule {
    pub name: String,
    pub terms: Vec<Term>,
    pub expected: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(default)]
    pub unit: AmountUnit,
    #[serde(default = "default_precision")]
    pub precision: u32,
    /// Where to store the recomputed value in the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_field: Option<FieldPath>,
}

impl ReconciliationRule {
    pub fn new(name: impl Into<String>, expected: FieldPath) -> Self {
        Self {
            name: name.into(),
            terms: Vec::new(),
            expected,
            tolerance: None,
            unit: AmountUnit::Currency,
            precision: default_precision(),
            computed_field: None,
        }
    }

    pub fn add(mut self, path: FieldPath) -> Self {
        self.terms.push(Term {
            path,
            sign: Sign::Add,
        });
        self
    }

    pub fn subtract(mut self, path: FieldPath) -> Self {
        self.terms.push(Term {
            path,
            sign: Sign::Subtract,
        });
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_unit(mut self, unit: AmountUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn storing_in(mut self, path: FieldPath) -> Self {
        self.computed_field = Some(path);
        self
    }

    /// Sum of all terms, or the first component that could not be read
    pub fn compute(&self, record: &Value) -> Result<f64, (String, String)> {
        let mut total = 0.0;
        for term in &self.terms {
            for value in term.path.resolve(record) {
                match amount_from_value(value) {
                    AmountValue::Number(n) => total += term.sign.factor() * n,
                    AmountValue::Missing => {}
                    AmountValue::Invalid(raw) => return Err((term.path.to_string(), raw)),
                }
            }
        }
        Ok(round_to(total, self.precision))
    }
}

/// Fallback tolerances by unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub currency: f64,
    pub usage: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            currency: 0.01,
            usage: 0.5,
        }
    }
}

impl Tolerances {
    pub fn for_rule(&self, rule: &ReconciliationRule) -> f64 {
        rule.tolerance.unwrap_or(match rule.unit {
            AmountUnit::Currency => self.currency,
            AmountUnit::Usage => self.usage,
        })
    }
}

pub fn reconcile(
    record: &Value,
    rule: &ReconciliationRule,
    tolerances: &Tolerances,
) -> ReconciliationCheck {
    let tolerance = tolerances.for_rule(rule);
    let mut check = ReconciliationCheck {
        rule: rule.name.clone(),
        expected_field: rule.expected.to_string(),
        computed: None,
        extracted: None,
        difference: None,
        tolerance,
        status: CheckStatus::Skipped,
        note: None,
    };

    let computed = match rule.compute(record) {
        Ok(total) => total,
        Err((path, raw)) => {
            check.note = Some(format!("{} has unreadable amount '{}'", path, raw));
            return check;
        }
    };
    check.computed = Some(computed);

    let extracted = match rule.expected.get(record).map(amount_from_value) {
        None | Some(AmountValue::Missing) => {
            check.note = Some("expected total missing".to_string());
            return check;
        }
        Some(AmountValue::Invalid(raw)) => {
            check.note = Some(format!("expected total has unreadable amount '{}'", raw));
            return check;
        }
        Some(AmountValue::Number(n)) => n,
    };
    check.extracted = Some(extracted);
    check.difference = Some(round_to(computed - extracted, rule.precision));

    check.status = if within_tolerance(computed, extracted, tolerance, rule.precision) {
        CheckStatus::Passed
    } else {
        CheckStatus::Failed
    };

    check
}

/// Writes the recomputed value into the rule's `computed_field`, if any
pub fn apply_computed(
    record: &mut Value,
    rule: &ReconciliationRule,
    check: &ReconciliationCheck,
) -> Result<(), ValidationError> {
    let (Some(field), Some(computed)) = (&rule.computed_field, check.computed) else {
        return Ok(());
    };

    let value = Number::from_f64(computed)
        .map(Value::Number)
        .unwrap_or(Value::Null);
    field.set(record, value)
}
