//! Provider schemas and lookup.
//!
//! A provider is pure data: the fields its bills carry, the totals that have
//! to reconcile and the dates that have to be ordered. Built-in providers
//! ship in `builtin.toml`; more can be loaded from catalog files with the
//! same layout.

mod catalog;

pub use catalog::{load_catalog, parse_catalog};

use crate::dates::DateOrder;
use crate::reconcile::ReconciliationRule;
use crate::schema::{FieldPath, FieldSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{FieldKind, ProviderKind, ValidationError};
use std::collections::{BTreeMap, HashSet};

const BUILTIN_CATALOG: &str = include_str!("builtin.toml");

/// Record keys that may name the issuing provider
const PROVIDER_KEYS: &[&str] = &["provider", "provider_name", "utility_name", "utility"];

/// Fields every balance-forward bill shares
const COMMON_FIELDS: &[(&str, FieldKind)] = &[
    ("account_number", FieldKind::Text),
    ("customer_name", FieldKind::Text),
    ("service_address", FieldKind::Text),
    ("bill_date", FieldKind::Date),
    ("due_date", FieldKind::Date),
    ("previous_balance", FieldKind::Number),
    ("payments_received", FieldKind::Number),
    ("current_charges", FieldKind::Number),
    ("total_amount_due", FieldKind::Number),
];

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub id: String,
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_true")]
    pub common_fields: bool,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub rules: Vec<ReconciliationRule>,
    #[serde(default)]
    pub date_order: Vec<DateOrder>,
}

impl ProviderSpec {
    /// Declared fields, preceded by the shared billing fields when enabled.
    /// A provider's own declaration wins over a shared one with the same path.
    pub fn effective_fields(&self) -> Vec<FieldSpec> {
        let mut fields = Vec::new();
        if self.common_fields {
            let own: HashSet<&str> = self.fields.iter().map(|f| f.path.as_str()).collect();
            for (path, kind) in COMMON_FIELDS {
                if own.contains(path) {
                    continue;
                }
                if let Ok(path) = FieldPath::parse(path) {
                    fields.push(FieldSpec::new(path, *kind));
                }
            }
        }
        fields.extend(self.fields.iter().cloned());
        fields
    }

    /// Date orderings to check, including bill date before due date for
    /// providers using the shared fields
    pub fn effective_date_order(&self) -> Vec<DateOrder> {
        let mut orders = Vec::new();
        if self.common_fields {
            if let (Ok(earlier), Ok(later)) =
                (FieldPath::parse("bill_date"), FieldPath::parse("due_date"))
            {
                orders.push(DateOrder { earlier, later });
            }
        }
        orders.extend(self.date_order.iter().cloned());
        orders
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() || self.id.len() > 100 {
            return Err(self.invalid("id must be 1-100 characters"));
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(self.invalid(
                "id must contain only lowercase letters, numbers, and underscores",
            ));
        }
        if self.name.trim().is_empty() {
            return Err(self.invalid("name must not be empty"));
        }

        let mut rule_names = HashSet::new();
        for rule in &self.rules {
            if !rule_names.insert(rule.name.as_str()) {
                return Err(self.invalid(&format!("duplicate rule name '{}'", rule.name)));
            }
            if rule.terms.is_empty() {
                return Err(self.invalid(&format!("rule '{}' has no terms", rule.name)));
            }
            if rule.expected.is_collection() {
                return Err(self.invalid(&format!(
                    "rule '{}' expects a total at a [] path",
                    rule.name
                )));
            }
            if let Some(field) = &rule.computed_field {
                if field.is_collection() {
                    return Err(self.invalid(&format!(
                        "rule '{}' stores its result at a [] path",
                        rule.name
                    )));
                }
            }
            if let Some(tolerance) = rule.tolerance {
                if !tolerance.is_finite() || tolerance < 0.0 {
                    return Err(self.invalid(&format!(
                        "rule '{}' has a negative or non-finite tolerance",
                        rule.name
                    )));
                }
            }
            if rule.precision > 6 {
                return Err(self.invalid(&format!(
                    "rule '{}' precision must be at most 6",
                    rule.name
                )));
            }
        }

        for order in &self.date_order {
            if order.earlier.is_collection() || order.later.is_collection() {
                return Err(self.invalid("date ordering cannot use [] paths"));
            }
        }

        Ok(())
    }

    /// Whether `candidate` names this provider by id, name or alias
    pub fn matches_name(&self, candidate: &str) -> bool {
        let wanted = normalize_name(candidate);
        if wanted.is_empty() {
            return false;
        }
        normalize_name(&self.id) == wanted
            || normalize_name(&self.name) == wanted
            || self.aliases.iter().any(|a| normalize_name(a) == wanted)
    }

    fn invalid(&self, reason: &str) -> ValidationError {
        ValidationError::InvalidProvider {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Providers keyed by id
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderSpec>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the providers shipped with the crate
    pub fn builtin() -> Result<Self, ValidationError> {
        let mut registry = Self::new();
        for spec in parse_catalog(BUILTIN_CATALOG)? {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Adds a provider, replacing any provider with the same id
    pub fn register(&mut self, spec: ProviderSpec) -> Result<(), ValidationError> {
        spec.validate()?;
        if self.providers.contains_key(&spec.id) {
            tracing::warn!("Replacing provider definition for {}", spec.id);
        } else {
            tracing::debug!("Registered provider {}", spec.id);
        }
        self.providers.insert(spec.id.clone(), spec);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ProviderSpec> {
        self.providers.get(id)
    }

    /// Looks a provider up by id first, then by name or alias
    pub fn find(&self, name: &str) -> Option<&ProviderSpec> {
        self.get(name)
            .or_else(|| self.providers.values().find(|p| p.matches_name(name)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderSpec> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Guesses the provider from the name fields of an extracted record
    pub fn detect(&self, record: &Value) -> Option<&ProviderSpec> {
        let obj = record.as_object()?;
        PROVIDER_KEYS
            .iter()
            .filter_map(|key| obj.get(*key).and_then(Value::as_str))
            .find_map(|name| self.find(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_registry_loads() {
        let registry = ProviderRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 15);
        assert!(registry.get("metro_water").is_some());
        assert!(registry.get("county_water_district").is_some());

        for provider in registry.iter() {
            provider.validate().unwrap();
            assert!(!provider.rules.is_empty(), "{} has no rules", provider.id);
        }
    }

    #[test]
    fn test_effective_fields_merge_common() {
        let registry = ProviderRegistry::builtin().unwrap();

        let metro = registry.get("metro_water").unwrap();
        let fields = metro.effective_fields();
        assert_eq!(fields[0].path.as_str(), "account_number");
        assert!(fields.iter().any(|f| f.path.as_str() == "line_items[].amount"));
        assert_eq!(metro.effective_date_order().len(), 2);

        let county = registry.get("county_water_district").unwrap();
        let fields = county.effective_fields();
        assert!(!fields.iter().any(|f| f.path.as_str() == "total_amount_due"));
        assert_eq!(
            fields
                .iter()
                .filter(|f| f.path.as_str() == "account_number")
                .count(),
            1
        );
        assert_eq!(county.effective_date_order().len(), 1);
    }

    #[test]
    fn test_detect_by_alias_and_name() {
        let registry = ProviderRegistry::builtin().unwrap();

        let record = json!({"utility_name": "METRO WATER"});
        assert_eq!(registry.detect(&record).unwrap().id, "metro_water");

        let record = json!({"provider": "Lakeside Water & Sewer District"});
        assert_eq!(registry.detect(&record).unwrap().id, "lakeside_water_sewer");

        let record = json!({"provider": "city_broadband"});
        assert_eq!(registry.detect(&record).unwrap().id, "city_broadband");

        assert!(registry.detect(&json!({"provider": "Acme Power"})).is_none());
        assert!(registry.detect(&json!({"provider": ""})).is_none());
        assert!(registry.detect(&json!("metro_water")).is_none());
    }

    #[test]
    fn test_register_rejects_invalid() {
        let mut registry = ProviderRegistry::new();
        let mut spec = ProviderSpec {
            id: "Bad Id".to_string(),
            name: "Bad".to_string(),
            kind: ProviderKind::Other,
            aliases: vec![],
            common_fields: true,
            fields: vec![],
            rules: vec![],
            date_order: vec![],
        };
        assert!(matches!(
            registry.register(spec.clone()),
            Err(ValidationError::InvalidProvider { .. })
        ));

        spec.id = "good_id".to_string();
        let rule = ReconciliationRule::new("sum", FieldPath::parse("items[].total").unwrap())
            .add(FieldPath::parse("items[].amount").unwrap());
        spec.rules.push(rule);
        assert!(registry.register(spec.clone()).is_err());

        spec.rules.clear();
        registry.register(spec.clone()).unwrap();
        spec.name = "Replacement".to_string();
        registry.register(spec).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("good_id").unwrap().name, "Replacement");
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let registry = ProviderRegistry::builtin().unwrap();
        let mut spec = registry.get("metro_water").unwrap().clone();
        let first = spec.rules[0].clone();
        spec.rules.push(first);
        assert!(spec.validate().is_err());
    }
}
