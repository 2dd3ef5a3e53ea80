use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Kind of organization that issued a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    City,
    WaterDistrict,
    SewerDistrict,
    WaterSewerDistrict,
    Electric,
    Gas,
    Stormwater,
    SolidWaste,
    Broadband,
    Other,
}

/// Declared type of a bill field, used to pick defaults and coerce values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    Boolean,
    Date,
    List,
    Object,
}

impl FieldKind {
    /// Whether a `null` found in the record should be replaced by the default
    pub fn is_container(&self) -> bool {
        matches!(self, FieldKind::List | FieldKind::Object)
    }
}

/// What a reconciliation rule is adding up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum AmountUnit {
    #[default]
    Currency,
    Usage,
}
