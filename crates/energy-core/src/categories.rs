//! Fixed renewable / non-renewable classification of energy sources.
//!
//! Membership is a static table. It is never derived from the columns that
//! happen to appear in a data file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{CategorizedRecord, EnergyRecord};

/// Source name of the spot price series. Kept in price units, never summed.
pub const SPOT_PRICE: &str = "spot_price";

/// Cross-region exchange channels. Dropped during normalization.
pub const EXCLUDED_SOURCES: &[&str] = &["regional_in", "regional_out"];

/// Sources counted towards the `renewable` total.
pub const RENEWABLE_SOURCES: &[&str] = &[
    "hydropower",
    "geothermal",
    "bioenergy",
    "solar",
    "wind",
    "pumping_up",
    "pumping_down",
    "battery_charge",
    "battery_generate",
];

/// Sources counted towards the `non_renewable` total.
pub const NON_RENEWABLE_SOURCES: &[&str] = &[
    "nuclear",
    "thermal_lng",
    "thermal_coal",
    "thermal_oil",
    "thermal_others",
    "others",
];

// ── EnergyCategory ────────────────────────────────────────────────────────────

/// Category tag assigned to a source name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyCategory {
    Renewable,
    NonRenewable,
    Unclassified,
}

impl EnergyCategory {
    /// The two categories that appear in the monthly summary, in output order.
    pub const SUMMARISED: [EnergyCategory; 2] =
        [EnergyCategory::Renewable, EnergyCategory::NonRenewable];

    /// Look up the category of `source` in the source tables.
    pub fn of(source: &str) -> Self {
        if RENEWABLE_SOURCES.contains(&source) {
            EnergyCategory::Renewable
        } else if NON_RENEWABLE_SOURCES.contains(&source) {
            EnergyCategory::NonRenewable
        } else {
            EnergyCategory::Unclassified
        }
    }

    /// Column / `type` label used in output tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyCategory::Renewable => "renewable",
            EnergyCategory::NonRenewable => "non_renewable",
            EnergyCategory::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for EnergyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `true` for sources that must never reach a record.
pub fn is_excluded_source(source: &str) -> bool {
    EXCLUDED_SOURCES.contains(&source)
}

/// Sum `values` per category. Unclassified sources are ignored.
pub fn category_totals(values: &BTreeMap<String, f64>) -> (f64, f64) {
    let mut renewable = 0.0;
    let mut non_renewable = 0.0;
    for (source, value) in values {
        match EnergyCategory::of(source) {
            EnergyCategory::Renewable => renewable += value,
            EnergyCategory::NonRenewable => non_renewable += value,
            EnergyCategory::Unclassified => {}
        }
    }
    (renewable, non_renewable)
}

/// Attach the `renewable` / `non_renewable` totals to a record.
pub fn categorize(record: &EnergyRecord) -> CategorizedRecord {
    let (renewable, non_renewable) = category_totals(&record.values);
    CategorizedRecord {
        record: record.clone(),
        renewable,
        non_renewable,
    }
}
