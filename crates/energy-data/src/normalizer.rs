//! Flattening of one raw year document into [`EnergyRecord`]s.
//!
//! A raw document looks like
//!
//! ```json
//! { "epochs": [1640995200, ...],
//!   "tokyo": { "nuclear": [1000, ...], "spot_price": [12.5, ...] },
//!   "kansai": { ... } }
//! ```
//!
//! Every position of `epochs` becomes one record per region. Cells that
//! cannot be used are skipped and tallied by [`SkipReason`] so callers can see
//! how much of a document was dropped.

use std::collections::BTreeMap;
use std::path::Path;

use energy_core::categories::{is_excluded_source, SPOT_PRICE};
use energy_core::error::{EnergyError, Result};
use energy_core::models::EnergyRecord;
use energy_core::time_utils::{checked_floor_to_week, TimezoneHandler};
use serde_json::{Map, Value};
use tracing::warn;

/// Top-level key holding the timestamp index.
pub const EPOCHS_KEY: &str = "epochs";

/// Source names that would collide with the `date` / `region` fields of an
/// output row.
pub const RESERVED_COLUMNS: &[&str] = &["date", "region"];

/// Divisor turning raw watt-scale generation into kilo-units.
pub const KILO: f64 = 1000.0;

// ── Skip accounting ───────────────────────────────────────────────────────────

/// Why a piece of a raw document did not make it into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    /// `regional_in` / `regional_out` cell.
    ExcludedSource,
    /// A source named like one of the row fields in [`RESERVED_COLUMNS`].
    ReservedColumn,
    /// The source's value is not an array.
    NotASeries,
    /// The source's array is shorter than `epochs`.
    IndexOutOfRange,
    /// The array element at this index is not a number.
    NonNumericValue,
    /// A top-level key other than `epochs` whose value is not an object.
    RegionNotAMapping,
    /// The epoch at this index is not a usable timestamp.
    InvalidEpoch,
}

/// Per-reason skip counts for one or more documents.
///
/// Cell-level reasons are counted once per (index, region, source) cell;
/// `RegionNotAMapping` once per key and `InvalidEpoch` once per index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub records: usize,
    pub skips: BTreeMap<SkipReason, usize>,
}

impl NormalizeReport {
    fn skip(&mut self, reason: SkipReason, count: usize) {
        if count > 0 {
            *self.skips.entry(reason).or_default() += count;
        }
    }

    /// Number of skips recorded for `reason`.
    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skips.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skips.values().sum()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: &NormalizeReport) {
        self.records += other.records;
        for (reason, count) in &other.skips {
            self.skip(*reason, *count);
        }
    }
}

/// Records produced from one document plus what was skipped on the way.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDocument {
    pub records: Vec<EnergyRecord>,
    pub report: NormalizeReport,
}

// ── Cell validation ───────────────────────────────────────────────────────────

/// Outcome of reading one `(source, index)` cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellOutcome {
    Accepted(f64),
    Skipped(SkipReason),
}

/// Read position `idx` of `series`, applying the unit conversion for `source`.
pub fn read_cell(source: &str, series: &[Value], idx: usize) -> CellOutcome {
    let Some(raw) = series.get(idx) else {
        return CellOutcome::Skipped(SkipReason::IndexOutOfRange);
    };
    let Some(value) = raw.as_f64() else {
        return CellOutcome::Skipped(SkipReason::NonNumericValue);
    };
    if source == SPOT_PRICE {
        CellOutcome::Accepted(value)
    } else {
        CellOutcome::Accepted(value / KILO)
    }
}

/// The usable columns of one region, validated once per document.
struct RegionColumns<'a> {
    name: &'a str,
    series: Vec<(&'a str, &'a [Value])>,
    excluded: usize,
    reserved: usize,
    not_series: usize,
}

impl<'a> RegionColumns<'a> {
    fn from_mapping(name: &'a str, mapping: &'a Map<String, Value>) -> Self {
        let mut columns = Self {
            name,
            series: Vec::with_capacity(mapping.len()),
            excluded: 0,
            reserved: 0,
            not_series: 0,
        };
        for (source, value) in mapping {
            if is_excluded_source(source) {
                columns.excluded += 1;
                continue;
            }
            if RESERVED_COLUMNS.contains(&source.as_str()) {
                columns.reserved += 1;
                continue;
            }
            match value.as_array() {
                Some(values) => columns.series.push((source.as_str(), values.as_slice())),
                None => columns.not_series += 1,
            }
        }
        columns
    }
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    if let Some(secs) = value.as_i64() {
        return Some(secs);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
        .map(|f| f.trunc() as i64)
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Flatten a parsed document into records.
///
/// `path` is only used for error messages. Fails with
/// [`EnergyError::MalformedDocument`] when the top level is not an object or
/// has no `epochs` array; everything below that is skipped cell by cell.
pub fn normalize_document(
    path: &Path,
    doc: &Value,
    tz: &TimezoneHandler,
) -> Result<NormalizedDocument> {
    let Some(top) = doc.as_object() else {
        return Err(EnergyError::MalformedDocument {
            path: path.to_path_buf(),
            reason: "top level is not an object".to_string(),
        });
    };
    let Some(epochs) = top.get(EPOCHS_KEY).and_then(Value::as_array) else {
        return Err(EnergyError::MalformedDocument {
            path: path.to_path_buf(),
            reason: format!("missing `{}` array", EPOCHS_KEY),
        });
    };

    let mut report = NormalizeReport::default();
    let mut regions: Vec<RegionColumns<'_>> = Vec::new();

    for (key, value) in top {
        if key == EPOCHS_KEY {
            continue;
        }
        match value.as_object() {
            Some(mapping) => regions.push(RegionColumns::from_mapping(key, mapping)),
            None => {
                warn!(
                    "{}: top-level key \"{}\" is not a region mapping, skipping",
                    path.display(),
                    key
                );
                report.skip(SkipReason::RegionNotAMapping, 1);
            }
        }
    }

    let mut records = Vec::with_capacity(epochs.len() * regions.len());

    for (idx, epoch) in epochs.iter().enumerate() {
        let Some(timestamp) = epoch_seconds(epoch)
            .and_then(|s| tz.epoch_to_local(s))
            .filter(|ts| checked_floor_to_week(*ts).is_some())
        else {
            report.skip(SkipReason::InvalidEpoch, 1);
            continue;
        };

        for region in &regions {
            report.skip(SkipReason::ExcludedSource, region.excluded);
            report.skip(SkipReason::ReservedColumn, region.reserved);
            report.skip(SkipReason::NotASeries, region.not_series);

            let mut values = BTreeMap::new();
            for (source, series) in &region.series {
                match read_cell(source, series, idx) {
                    CellOutcome::Accepted(v) => {
                        values.insert((*source).to_string(), v);
                    }
                    CellOutcome::Skipped(reason) => report.skip(reason, 1),
                }
            }

            records.push(EnergyRecord {
                timestamp,
                region: region.name.to_string(),
                values,
            });
        }
    }

    report.records = records.len();
    Ok(NormalizedDocument { records, report })
}
