pub mod bill;
pub mod provider;
pub mod validation;

pub use bill::{LineItem, MeterReading, NormalizedBill, ServicePeriod};
pub use provider::{AmountUnit, FieldKind, ProviderKind};
pub use validation::{
    BatchEntry, BatchSummary, CheckStatus, IssueSeverity, ReconciliationCheck, ReportIssue,
    ValidationError, ValidationReport,
};
