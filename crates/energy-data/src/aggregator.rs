//! Per-source rollups at hourly, daily, weekly and monthly resolution.
//!
//! Energy columns are summed within a bucket; `spot_price` is averaged over
//! the members that carry a price.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use energy_core::categories::SPOT_PRICE;
use energy_core::models::{AggregationLevel, EnergyRecord, LevelRow};
use energy_core::time_utils::{floor_to_day, floor_to_month, floor_to_week};

// ── BucketStats ───────────────────────────────────────────────────────────────

/// Running totals for one (bucket_start, region) key.
#[derive(Debug, Clone, Default)]
pub struct BucketStats {
    /// Per-source sums, price excluded.
    pub sums: BTreeMap<String, f64>,
    pub price_sum: f64,
    pub price_count: u32,
}

impl BucketStats {
    /// Add a single record's values to the running totals.
    pub fn add_record(&mut self, record: &EnergyRecord) {
        for (source, value) in &record.values {
            if source == SPOT_PRICE {
                self.price_sum += value;
                self.price_count += 1;
            } else {
                *self.sums.entry(source.clone()).or_default() += value;
            }
        }
    }

    /// Mean price of the members that had one.
    pub fn mean_price(&self) -> Option<f64> {
        (self.price_count > 0).then(|| self.price_sum / f64::from(self.price_count))
    }

    /// Render as a row carrying exactly `columns`.
    fn into_row(self, date: NaiveDateTime, region: String, columns: &BTreeSet<String>) -> LevelRow {
        let values = columns
            .iter()
            .map(|column| {
                let value = if column == SPOT_PRICE {
                    self.mean_price()
                } else {
                    Some(self.sums.get(column).copied().unwrap_or(0.0))
                };
                (column.clone(), value)
            })
            .collect();
        LevelRow {
            date,
            region,
            values,
        }
    }
}

// ── LevelAggregator ───────────────────────────────────────────────────────────

/// Stateless helper that groups records by time bucket and region.
pub struct LevelAggregator;

impl LevelAggregator {
    /// Aggregate `records` at `level`.
    ///
    /// Hourly returns one row per input record in input order; the other
    /// levels return one row per (bucket_start, region), sorted by key.
    pub fn aggregate(records: &[EnergyRecord], level: AggregationLevel) -> Vec<LevelRow> {
        let columns = Self::columns(records);
        match level {
            AggregationLevel::Hourly => Self::passthrough(records, &columns),
            AggregationLevel::Daily => Self::aggregate_by_bucket(records, &columns, floor_to_day),
            AggregationLevel::Weekly => Self::aggregate_by_bucket(records, &columns, floor_to_week),
            AggregationLevel::Monthly => {
                Self::aggregate_by_bucket(records, &columns, floor_to_month)
            }
        }
    }

    /// Union of source names over `records`.
    pub fn columns(records: &[EnergyRecord]) -> BTreeSet<String> {
        records
            .iter()
            .flat_map(|r| r.values.keys().cloned())
            .collect()
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Identity transform; columns a record lacks are `null`.
    fn passthrough(records: &[EnergyRecord], columns: &BTreeSet<String>) -> Vec<LevelRow> {
        records
            .iter()
            .map(|record| LevelRow {
                date: record.timestamp,
                region: record.region.clone(),
                values: columns
                    .iter()
                    .map(|c| (c.clone(), record.value(c)))
                    .collect(),
            })
            .collect()
    }

    /// Generic bucketing driver.
    ///
    /// `bucket_fn` truncates a timestamp to the start of its bucket.
    fn aggregate_by_bucket(
        records: &[EnergyRecord],
        columns: &BTreeSet<String>,
        bucket_fn: impl Fn(NaiveDateTime) -> NaiveDateTime,
    ) -> Vec<LevelRow> {
        let mut map: BTreeMap<(NaiveDateTime, String), BucketStats> = BTreeMap::new();

        for record in records {
            let key = (bucket_fn(record.timestamp), record.region.clone());
            map.entry(key).or_default().add_record(record);
        }

        map.into_iter()
            .map(|((date, region), stats)| stats.into_row(date, region, columns))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
