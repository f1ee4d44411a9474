use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::categories::EnergyCategory;

/// One normalized sample: a single region at a single local timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyRecord {
    /// Local wall-clock time of the sample, second precision.
    #[serde(rename = "date")]
    pub timestamp: NaiveDateTime,
    /// Generation area the sample belongs to.
    pub region: String,
    /// Source name → value. Energy sources are in kilo-units, `spot_price`
    /// is in price units.
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl EnergyRecord {
    /// Value of `source`, or `None` when the record has no such column.
    pub fn value(&self, source: &str) -> Option<f64> {
        self.values.get(source).copied()
    }
}

/// An [`EnergyRecord`] with its per-category totals attached.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedRecord {
    pub record: EnergyRecord,
    pub renewable: f64,
    pub non_renewable: f64,
}

impl CategorizedRecord {
    /// Total for one of the summarised categories; `Unclassified` is always 0.
    pub fn total(&self, category: EnergyCategory) -> f64 {
        match category {
            EnergyCategory::Renewable => self.renewable,
            EnergyCategory::NonRenewable => self.non_renewable,
            EnergyCategory::Unclassified => 0.0,
        }
    }
}

// ── AggregationLevel ──────────────────────────────────────────────────────────

/// Temporal resolution of the level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationLevel {
    /// No bucketing: records pass through unchanged.
    #[default]
    Hourly,
    Daily,
    /// Buckets start on Monday 00:00.
    Weekly,
    Monthly,
}

impl AggregationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationLevel::Hourly => "hourly",
            AggregationLevel::Daily => "daily",
            AggregationLevel::Weekly => "weekly",
            AggregationLevel::Monthly => "monthly",
        }
    }

    /// Resolve a caller-supplied level name.
    ///
    /// Unknown names fall back to [`AggregationLevel::Hourly`]; the second
    /// element then carries a warning for the caller.
    pub fn resolve(name: &str) -> (Self, Option<String>) {
        match name.parse() {
            Ok(level) => (level, None),
            Err(_) => (
                AggregationLevel::Hourly,
                Some(format!(
                    "unrecognised aggregation level \"{}\", using hourly",
                    name
                )),
            ),
        }
    }
}

impl FromStr for AggregationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hourly" => Ok(AggregationLevel::Hourly),
            "daily" => Ok(AggregationLevel::Daily),
            "weekly" => Ok(AggregationLevel::Weekly),
            "monthly" => Ok(AggregationLevel::Monthly),
            other => Err(format!("unknown aggregation level: {}", other)),
        }
    }
}

impl std::fmt::Display for AggregationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── IncompleteMonthPolicy ─────────────────────────────────────────────────────

/// What the monthly rollup does when every month in a multi-month window is
/// incomplete.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteMonthPolicy {
    /// Drop incomplete months even if nothing is left.
    #[default]
    Drop,
    /// Keep the unfiltered records when dropping would leave nothing.
    #[value(name = "fallback")]
    FallBackToUnfiltered,
}

// ── Output rows ───────────────────────────────────────────────────────────────

/// One row of the level table.
///
/// Every row of a table carries the same columns; a source with no value in
/// a row is `null` (hourly) and `spot_price` is `null` when no member of the
/// bucket had a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRow {
    pub date: NaiveDateTime,
    pub region: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl LevelRow {
    pub fn value(&self, source: &str) -> Option<f64> {
        self.values.get(source).copied().flatten()
    }
}

/// One row of the long-form monthly category summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRow {
    /// First instant of the month.
    pub date_id: NaiveDateTime,
    pub region: String,
    #[serde(rename = "type")]
    pub category: EnergyCategory,
    pub value: f64,
}

/// Day coverage of one (month, region) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCompleteness {
    pub month_start: NaiveDateTime,
    pub region: String,
    pub observed_days: u32,
    pub expected_days: u32,
}

impl MonthCompleteness {
    pub fn is_complete(&self) -> bool {
        self.observed_days == self.expected_days
    }
}
