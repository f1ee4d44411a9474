//! Monthly renewable / non-renewable summary.
//!
//! When a window covers more than one month, region-months that are missing
//! any calendar day are dropped before summing so partial months do not
//! show up as dips. A single-month window is always kept as is.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use energy_core::categories::EnergyCategory;
use energy_core::models::{CategorizedRecord, IncompleteMonthPolicy, MonthCompleteness, MonthlyRow};
use energy_core::time_utils::{days_in_month, floor_to_month};
use tracing::{debug, warn};

type MonthKey = (NaiveDateTime, String);

/// Result of a monthly rollup.
#[derive(Debug, Clone, Default)]
pub struct MonthlySummary {
    /// Long-form rows: every `renewable` row, then every `non_renewable` row,
    /// each group ordered by month and region.
    pub rows: Vec<MonthlyRow>,
    /// Day coverage of every (month, region) pair in the input.
    pub completeness: Vec<MonthCompleteness>,
    /// `true` when incomplete months were actually removed.
    pub filtered: bool,
    /// `true` when filtering removed everything and the unfiltered set was used.
    pub fell_back: bool,
}

/// Stateless helper that rolls categorized records up by calendar month.
pub struct MonthlyRollup;

impl MonthlyRollup {
    /// Observed vs expected days for every (month, region) pair, sorted by key.
    pub fn completeness(records: &[CategorizedRecord]) -> Vec<MonthCompleteness> {
        let mut days: BTreeMap<MonthKey, BTreeSet<NaiveDate>> = BTreeMap::new();
        for c in records {
            let key = (floor_to_month(c.record.timestamp), c.record.region.clone());
            days.entry(key).or_default().insert(c.record.timestamp.date());
        }

        days.into_iter()
            .map(|((month_start, region), dates)| MonthCompleteness {
                expected_days: days_in_month(month_start.year(), month_start.month()),
                observed_days: dates.len() as u32,
                month_start,
                region,
            })
            .collect()
    }

    /// Roll `records` up into the long-form monthly table.
    pub fn rollup(records: &[CategorizedRecord], policy: IncompleteMonthPolicy) -> MonthlySummary {
        let completeness = Self::completeness(records);
        let months: BTreeSet<NaiveDateTime> =
            completeness.iter().map(|c| c.month_start).collect();

        let mut filtered = false;
        let mut fell_back = false;
        let mut kept: Vec<&CategorizedRecord> = records.iter().collect();

        if months.len() > 1 {
            let complete: BTreeSet<MonthKey> = completeness
                .iter()
                .filter(|c| c.is_complete())
                .map(|c| (c.month_start, c.region.clone()))
                .collect();

            let retained: Vec<&CategorizedRecord> = records
                .iter()
                .filter(|c| {
                    complete.contains(&(floor_to_month(c.record.timestamp), c.record.region.clone()))
                })
                .collect();

            debug!(
                "Monthly completeness: {}/{} region-months complete, {}/{} records retained",
                complete.len(),
                completeness.len(),
                retained.len(),
                records.len()
            );

            if retained.is_empty()
                && !records.is_empty()
                && policy == IncompleteMonthPolicy::FallBackToUnfiltered
            {
                warn!("Every month in the window is incomplete; using unfiltered data");
                fell_back = true;
            } else {
                filtered = retained.len() < records.len();
                kept = retained;
            }
        }

        MonthlySummary {
            rows: Self::melt(&kept),
            completeness,
            filtered,
            fell_back,
        }
    }

    /// Sum per (month, region) and reshape into one row per category.
    fn melt(records: &[&CategorizedRecord]) -> Vec<MonthlyRow> {
        // Category leads the key so all renewable rows sort first.
        let mut totals: BTreeMap<(EnergyCategory, MonthKey), f64> = BTreeMap::new();
        for c in records {
            let key = (floor_to_month(c.record.timestamp), c.record.region.clone());
            for category in EnergyCategory::SUMMARISED {
                *totals.entry((category, key.clone())).or_default() += c.total(category);
            }
        }

        totals
            .into_iter()
            .map(|((category, (date_id, region)), value)| MonthlyRow {
                date_id,
                region,
                category,
                value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_core::categories::categorize;
    use energy_core::models::EnergyRecord;

    fn categorized(y: i32, m: u32, d: u32, region: &str, values: &[(&str, f64)]) -> CategorizedRecord {
        categorize(&EnergyRecord {
            timestamp: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            region: region.to_string(),
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        })
    }

    /// One record per day for days `from..=to` of the month.
    fn month_days(y: i32, m: u32, from: u32, to: u32, region: &str) -> Vec<CategorizedRecord> {
        (from..=to)
            .map(|d| categorized(y, m, d, region, &[("solar", 1.0), ("nuclear", 2.0)]))
            .collect()
    }

    fn month(y: i32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn value_of(rows: &[MonthlyRow], date_id: NaiveDateTime, region: &str, category: EnergyCategory) -> Option<f64> {
        rows.iter()
            .find(|r| r.date_id == date_id && r.region == region && r.category == category)
            .map(|r| r.value)
    }

    // ── completeness ──────────────────────────────────────────────────────────

    #[test]
    fn test_completeness_counts_distinct_days() {
        let mut records = month_days(2022, 2, 1, 10, "tokyo");
        // A second sample on an already-observed day does not add a day.
        records.push(categorized(2022, 2, 5, "tokyo", &[("solar", 1.0)]));
        let c = MonthlyRollup::completeness(&records);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].month_start, month(2022, 2));
        assert_eq!(c[0].observed_days, 10);
        assert_eq!(c[0].expected_days, 28);
        assert!(!c[0].is_complete());
    }

    // ── single month ──────────────────────────────────────────────────────────

    #[test]
    fn test_single_partial_month_is_kept() {
        let records = month_days(2022, 2, 1, 3, "tokyo");
        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::Drop);
        assert!(!summary.filtered);
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(value_of(&summary.rows, month(2022, 2), "tokyo", EnergyCategory::Renewable), Some(3.0));
        assert_eq!(value_of(&summary.rows, month(2022, 2), "tokyo", EnergyCategory::NonRenewable), Some(6.0));
    }

    // ── multi month ───────────────────────────────────────────────────────────

    #[test]
    fn test_incomplete_month_dropped_when_window_spans_months() {
        let mut records = month_days(2022, 1, 1, 31, "tokyo");
        records.extend(month_days(2022, 2, 1, 10, "tokyo"));

        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::Drop);
        assert!(summary.filtered);
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(value_of(&summary.rows, month(2022, 1), "tokyo", EnergyCategory::Renewable), Some(31.0));
        assert_eq!(value_of(&summary.rows, month(2022, 1), "tokyo", EnergyCategory::NonRenewable), Some(62.0));
        assert!(summary.rows.iter().all(|r| r.date_id != month(2022, 2)));
    }

    #[test]
    fn test_completeness_is_per_region() {
        let mut records = month_days(2022, 1, 1, 31, "tokyo");
        records.extend(month_days(2022, 1, 1, 30, "kansai"));
        records.extend(month_days(2022, 2, 1, 28, "kansai"));

        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::Drop);
        assert!(value_of(&summary.rows, month(2022, 1), "tokyo", EnergyCategory::Renewable).is_some());
        assert!(value_of(&summary.rows, month(2022, 1), "kansai", EnergyCategory::Renewable).is_none());
        assert!(value_of(&summary.rows, month(2022, 2), "kansai", EnergyCategory::Renewable).is_some());
    }

    #[test]
    fn test_leap_february_needs_29_days() {
        let mut records = month_days(2024, 1, 1, 31, "tokyo");
        records.extend(month_days(2024, 2, 1, 28, "tokyo"));
        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::Drop);
        assert!(summary.rows.iter().all(|r| r.date_id == month(2024, 1)));

        records.extend(month_days(2024, 2, 29, 29, "tokyo"));
        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::Drop);
        assert!(summary.rows.iter().any(|r| r.date_id == month(2024, 2)));
    }

    // ── all incomplete ────────────────────────────────────────────────────────

    #[test]
    fn test_all_incomplete_drop_policy_returns_empty() {
        let mut records = month_days(2022, 1, 20, 31, "tokyo");
        records.extend(month_days(2022, 2, 1, 10, "tokyo"));

        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::Drop);
        assert!(summary.rows.is_empty());
        assert!(summary.filtered);
        assert!(!summary.fell_back);
    }

    #[test]
    fn test_all_incomplete_fallback_policy_uses_unfiltered() {
        let mut records = month_days(2022, 1, 20, 31, "tokyo");
        records.extend(month_days(2022, 2, 1, 10, "tokyo"));

        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::FallBackToUnfiltered);
        assert!(summary.fell_back);
        assert!(!summary.filtered);
        assert_eq!(summary.rows.len(), 4);
        assert_eq!(value_of(&summary.rows, month(2022, 1), "tokyo", EnergyCategory::Renewable), Some(12.0));
        assert_eq!(value_of(&summary.rows, month(2022, 2), "tokyo", EnergyCategory::NonRenewable), Some(20.0));
    }

    #[test]
    fn test_fallback_not_used_when_something_is_complete() {
        let mut records = month_days(2022, 1, 1, 31, "tokyo");
        records.extend(month_days(2022, 2, 1, 10, "tokyo"));
        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::FallBackToUnfiltered);
        assert!(!summary.fell_back);
        assert_eq!(summary.rows.len(), 2);
    }

    // ── shape ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_melt_orders_renewable_rows_first() {
        let mut records = month_days(2022, 1, 1, 31, "tokyo");
        records.extend(month_days(2022, 1, 1, 31, "kansai"));
        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::Drop);
        let shape: Vec<(&str, EnergyCategory)> = summary
            .rows
            .iter()
            .map(|r| (r.region.as_str(), r.category))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("kansai", EnergyCategory::Renewable),
                ("tokyo", EnergyCategory::Renewable),
                ("kansai", EnergyCategory::NonRenewable),
                ("tokyo", EnergyCategory::NonRenewable),
            ]
        );
    }

    #[test]
    fn test_unclassified_sources_ignored() {
        let records = vec![categorized(
            2022,
            3,
            1,
            "tokyo",
            &[("spot_price", 50.0), ("demand", 99.0), ("wind", 1.5)],
        )];
        let summary = MonthlyRollup::rollup(&records, IncompleteMonthPolicy::Drop);
        assert_eq!(value_of(&summary.rows, month(2022, 3), "tokyo", EnergyCategory::Renewable), Some(1.5));
        assert_eq!(value_of(&summary.rows, month(2022, 3), "tokyo", EnergyCategory::NonRenewable), Some(0.0));
    }

    #[test]
    fn test_empty_input() {
        let summary = MonthlyRollup::rollup(&[], IncompleteMonthPolicy::FallBackToUnfiltered);
        assert!(summary.rows.is_empty());
        assert!(summary.completeness.is_empty());
        assert!(!summary.fell_back);
    }
}
