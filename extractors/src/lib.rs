//! Extractors Crate
//!
//! Post-processing for structured data extracted from utility bills. Each
//! provider (city, water/sewer district, utility) declares the shape of its
//! bills as data; one generic pipeline fills missing fields, recomputes the
//! derived totals and compares them with the extracted ones.
//!
//! # Architecture
//!
//! - **Types**: report and bill types are defined in the `shared-types` crate
//! - **Schema**: `FieldPath` and `ensure_fields` give every record of a provider the same shape
//! - **Reconciliation**: `ReconciliationRule` sums components and checks them against a total
//! - **Providers**: `ProviderRegistry` holds the built-in and catalog-loaded provider schemas
//!
//! # Example
//!
//! ```rust,ignore
//! use extractors::BillPostProcessor;
//!
//! let processor = BillPostProcessor::with_defaults()?;
//! let report = processor.process(Some("metro_water"), &mut record)?;
//! println!("passed: {}", report.passed);
//! ```

pub mod dates;
pub mod numeric;
pub mod postprocess;
pub mod providers;
pub mod reconcile;
pub mod schema;

// Re-export commonly used types
pub use dates::{parse_bill_date, DateOrder};
pub use numeric::{amount_from_value, parse_amount, AmountValue};
pub use postprocess::{BillPostProcessor, PostProcessor, ProviderPostProcessor, ValidationSettings};
pub use providers::{load_catalog, parse_catalog, ProviderRegistry, ProviderSpec};
pub use reconcile::{reconcile, ReconciliationRule, Sign, Term, Tolerances};
pub use schema::{ensure_fields, FieldPath, FieldSpec, ShapeOutcome};

// Re-export the report types from shared-types for convenience
pub use shared_types::{ReconciliationCheck, ValidationError, ValidationReport};
