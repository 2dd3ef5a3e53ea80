use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Errors raised while normalizing or validating an extracted bill
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Could not detect provider from record")]
    ProviderNotDetected,

    #[error("Invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid provider '{id}': {reason}")]
    InvalidProvider { id: String, reason: String },

    #[error("Catalog error: {0}")]
    Catalog(String),
}

/// Outcome of a single reconciliation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of recomputing a derived total and comparing it to the extracted one
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationCheck {
    pub rule: String,
    pub expected_field: String,
    pub computed: Option<f64>,
    pub extracted: Option<f64>,
    pub difference: Option<f64>,
    pub tolerance: f64,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub note: Option<String>,
}

impl ReconciliationCheck {
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// Problem found while shaping or checking a record that is not a total mismatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportIssue {
    pub path: String,
    pub severity: IssueSeverity,
    pub message: String,
}

impl ReportIssue {
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }
}

/// Everything the post-processor learned about one record
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationReport {
    pub provider: String,
    pub passed: bool,
    pub checks: Vec<ReconciliationCheck>,
    pub filled_fields: Vec<String>,
    pub coerced_fields: Vec<String>,
    pub issues: Vec<ReportIssue>,
}

impl ValidationReport {
    pub fn failed_checks(&self) -> impl Iterator<Item = &ReconciliationCheck> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Failed)
    }

    pub fn skipped_checks(&self) -> impl Iterator<Item = &ReconciliationCheck> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Skipped)
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error)
    }
}

/// Per-record outcome inside a batch
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "outcome", content = "detail", rename_all = "kebab-case")]
pub enum BatchEntry {
    Report(ValidationReport),
    Error(String),
}

/// Totals over a batch of records
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub entries: Vec<BatchEntry>,
}

impl BatchSummary {
    pub fn push(&mut self, entry: BatchEntry) {
        self.total += 1;
        match &entry {
            BatchEntry::Report(report) if report.passed => self.passed += 1,
            BatchEntry::Report(_) => self.failed += 1,
            BatchEntry::Error(_) => self.errored += 1,
        }
        self.entries.push(entry);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}
