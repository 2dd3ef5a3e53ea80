use crate::dates::service_days;
use crate::providers::{ProviderRegistry, ProviderSpec};
use crate::reconcile::{apply_computed, reconcile, Tolerances};
use crate::schema::{ensure_fields, FieldPath};
use serde_json::{json, Value};
use shared_types::{
    BatchEntry, BatchSummary, CheckStatus, IssueSeverity, ReportIssue, ValidationError,
    ValidationReport,
};

/// Key the report is written under when annotation is enabled
pub const VALIDATION_KEY: &str = "validation";

/// Core trait for anything that normalizes and checks one extracted record
pub trait PostProcessor {
    fn process(&self, record: &mut Value) -> Result<ValidationReport, ValidationError>;

    /// Which provider layout this processor understands
    fn provider_id(&self) -> &str;

    fn version(&self) -> String {
        "1.0.0".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationSettings {
    pub tolerances: Tolerances,
    /// Write the report into the record under `validation`
    pub annotate: bool,
    /// Treat skipped checks as failures
    pub strict: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            annotate: true,
            strict: false,
        }
    }
}

/// Runs provider schemas over extracted bill records
pub struct BillPostProcessor {
    registry: ProviderRegistry,
    settings: ValidationSettings,
}

impl BillPostProcessor {
    pub fn new(registry: ProviderRegistry, settings: ValidationSettings) -> Self {
        Self { registry, settings }
    }

    /// Post-processor over the built-in providers with default settings
    pub fn with_defaults() -> Result<Self, ValidationError> {
        Ok(Self::new(
            ProviderRegistry::builtin()?,
            ValidationSettings::default(),
        ))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolves the provider by id, name or alias, or detects it from the record
    pub fn resolve_provider(
        &self,
        provider: Option<&str>,
        record: &Value,
    ) -> Result<&ProviderSpec, ValidationError> {
        match provider {
            Some(name) => self
                .registry
                .find(name)
                .ok_or_else(|| ValidationError::UnknownProvider(name.to_string())),
            None => self
                .registry
                .detect(record)
                .ok_or(ValidationError::ProviderNotDetected),
        }
    }

    pub fn process(
        &self,
        provider: Option<&str>,
        record: &mut Value,
    ) -> Result<ValidationReport, ValidationError> {
        if !record.is_object() {
            return Err(ValidationError::InvalidRecord(format!(
                "expected a JSON object, found {}",
                json_type(record)
            )));
        }

        let spec = self.resolve_provider(provider, record)?;
        process_with_spec(spec, &self.settings, record)
    }

    /// Processes every record, collecting per-record errors instead of stopping
    pub fn process_batch(&self, provider: Option<&str>, records: &mut [Value]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for (index, record) in records.iter_mut().enumerate() {
            match self.process(provider, record) {
                Ok(report) => summary.push(BatchEntry::Report(report)),
                Err(e) => {
                    tracing::warn!("Record {} could not be processed: {}", index, e);
                    summary.push(BatchEntry::Error(e.to_string()));
                }
            }
        }
        tracing::info!(
            "Processed {} record(s): {} passed, {} failed, {} errored",
            summary.total,
            summary.passed,
            summary.failed,
            summary.errored
        );
        summary
    }

    /// Post-processor bound to a single provider
    pub fn for_provider(&self, provider: &str) -> Result<ProviderPostProcessor, ValidationError> {
        let spec = self
            .registry
            .find(provider)
            .ok_or_else(|| ValidationError::UnknownProvider(provider.to_string()))?;
        Ok(ProviderPostProcessor {
            spec: spec.clone(),
            settings: self.settings,
        })
    }
}

/// Processes records of one provider
pub struct ProviderPostProcessor {
    spec: ProviderSpec,
    settings: ValidationSettings,
}

impl ProviderPostProcessor {
    pub fn new(spec: ProviderSpec, settings: ValidationSettings) -> Result<Self, ValidationError> {
        spec.validate()?;
        Ok(Self { spec, settings })
    }
}

impl PostProcessor for ProviderPostProcessor {
    fn process(&self, record: &mut Value) -> Result<ValidationReport, ValidationError> {
        if !record.is_object() {
            return Err(ValidationError::InvalidRecord(format!(
                "expected a JSON object, found {}",
                json_type(record)
            )));
        }
        process_with_spec(&self.spec, &self.settings, record)
    }

    fn provider_id(&self) -> &str {
        &self.spec.id
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

fn process_with_spec(
    spec: &ProviderSpec,
    settings: &ValidationSettings,
    record: &mut Value,
) -> Result<ValidationReport, ValidationError> {
    // A report left by an earlier run must not feed back into this one
    if let Some(obj) = record.as_object_mut() {
        obj.remove(VALIDATION_KEY);
    }

    let shape = ensure_fields(record, &spec.effective_fields());
    for path in &shape.filled {
        tracing::debug!("{}: filled missing field {}", spec.id, path);
    }

    let mut filled = shape.filled;
    let mut issues = shape.issues;

    if let Some(path) = fill_service_days(record)? {
        if !filled.contains(&path) {
            filled.push(path);
        }
    }

    let mut checks = Vec::with_capacity(spec.rules.len());
    for rule in &spec.rules {
        let check = reconcile(record, rule, &settings.tolerances);
        match check.status {
            CheckStatus::Failed => tracing::warn!(
                "{}: {} mismatch, computed {:?} vs extracted {:?} (difference {:?})",
                spec.id,
                rule.name,
                check.computed,
                check.extracted,
                check.difference
            ),
            CheckStatus::Skipped => tracing::debug!(
                "{}: {} skipped: {}",
                spec.id,
                rule.name,
                check.note.as_deref().unwrap_or("")
            ),
            CheckStatus::Passed => tracing::debug!("{}: {} passed", spec.id, rule.name),
        }
        if let Err(e) = apply_computed(record, rule, &check) {
            issues.push(ReportIssue::warning(rule.name.clone(), e.to_string()));
        }
        checks.push(check);
    }

    for order in spec.effective_date_order() {
        for issue in order.check(record) {
            // Coercion already warned about dates it could not read
            let seen = issue.severity == IssueSeverity::Warning
                && issues.iter().any(|i| i.path == issue.path);
            if !seen {
                issues.push(issue);
            }
        }
    }

    let any_failed = checks.iter().any(|c| c.status == CheckStatus::Failed);
    let any_skipped = checks.iter().any(|c| c.status == CheckStatus::Skipped);
    let has_errors = issues
        .iter()
        .any(|i| i.severity == IssueSeverity::Error);

    let report = ValidationReport {
        provider: spec.id.clone(),
        passed: !any_failed && !has_errors && !(settings.strict && any_skipped),
        checks,
        filled_fields: filled,
        coerced_fields: shape.coerced,
        issues,
    };

    if settings.annotate {
        annotate(record, &report);
    }

    Ok(report)
}

/// Fills `service_period.days` from the period dates when the record has the
/// field but no value
fn fill_service_days(record: &mut Value) -> Result<Option<String>, ValidationError> {
    let days_path = FieldPath::parse("service_period.days")?;
    if !matches!(days_path.get(record), Some(Value::Null)) {
        return Ok(None);
    }

    let period = &record["service_period"];
    let (Some(start), Some(end)) = (period["start"].as_str(), period["end"].as_str()) else {
        return Ok(None);
    };
    let Some(days) = service_days(start, end) else {
        return Ok(None);
    };

    days_path.set(record, json!(days))?;
    Ok(Some(days_path.to_string()))
}

fn annotate(record: &mut Value, report: &ValidationReport) {
    let block = json!({
        "passed": report.passed,
        "checks": report.checks,
        "issues": report.issues,
    });
    if let Some(obj) = record.as_object_mut() {
        obj.insert(VALIDATION_KEY.to_string(), block);
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn issue_summary(issues: &[ReportIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.path, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}
