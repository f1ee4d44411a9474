//! Engine entry point.
//!
//! Load → filter → {level rollup, categorize → monthly rollup}, returning an
//! [`QueryOutcome`] ready to serialize.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use energy_core::categories::categorize;
use energy_core::error::Result;
use energy_core::models::{
    AggregationLevel, CategorizedRecord, IncompleteMonthPolicy, LevelRow, MonthlyRow,
};
use energy_core::settings::Settings;
use energy_core::time_utils::TimezoneHandler;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregator::LevelAggregator;
use crate::filter::WindowFilter;
use crate::monthly::MonthlyRollup;
use crate::reader::{load_sources, LoadSummary};

// ── Inputs ────────────────────────────────────────────────────────────────────

/// Already-parsed query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnergyQuery {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub region: Option<String>,
    /// Requested level name; unknown names fall back to hourly with a warning.
    pub aggregation: String,
}

impl EnergyQuery {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            start: settings.start_bound()?,
            end: settings.end_bound()?,
            region: settings.region.clone(),
            aggregation: settings.aggregation.clone(),
        })
    }

    pub fn window(&self) -> WindowFilter {
        WindowFilter {
            start: self.start,
            end: self.end,
            region: self.region.clone(),
        }
    }
}

/// Engine configuration that is not part of an individual query.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub timezone: TimezoneHandler,
    pub incomplete_months: IncompleteMonthPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timezone: TimezoneHandler::utc(),
            incomplete_months: IncompleteMonthPolicy::default(),
        }
    }
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            timezone: settings.timezone_handler()?,
            incomplete_months: settings.incomplete_months,
        })
    }
}

// ── Outputs ───────────────────────────────────────────────────────────────────

/// Counters describing one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub files_requested: usize,
    pub files_loaded: usize,
    pub records_loaded: usize,
    pub records_skipped_cells: usize,
    pub records_after_filter: usize,
    pub incomplete_months_dropped: bool,
    pub monthly_fell_back: bool,
}

/// The two tables produced for one query.
///
/// Both tables empty with `Ok` means the filters matched nothing; that is a
/// successful answer, distinct from [`EnergyError::NoData`].
///
/// [`EnergyError::NoData`]: energy_core::error::EnergyError::NoData
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub level: AggregationLevel,
    pub level_table: Vec<LevelRow>,
    pub monthly_table: Vec<MonthlyRow>,
    pub warnings: Vec<String>,
    pub stats: QueryStats,
}

impl QueryOutcome {
    pub fn is_empty(&self) -> bool {
        self.level_table.is_empty() && self.monthly_table.is_empty()
    }

    pub fn into_response(self) -> ApiResponse {
        ApiResponse {
            level: LevelTables {
                daily: self.level_table,
            },
            categorized: CategorizedTables {
                monthly: self.monthly_table,
            },
        }
    }
}

/// Response envelope: `{"type": {"daily": [...]}, "categorized": {"monthly": [...]}}`.
///
/// `daily` holds the level table whatever level was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "type")]
    pub level: LevelTables,
    pub categorized: CategorizedTables,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelTables {
    pub daily: Vec<LevelRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizedTables {
    pub monthly: Vec<MonthlyRow>,
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Run a query against the given source files.
///
/// Files are loaded best-effort in order. Fails with `NoData` when none of
/// them produced a record.
pub fn run_query(
    files: &[PathBuf],
    query: &EnergyQuery,
    options: &EngineOptions,
) -> Result<QueryOutcome> {
    let summary = load_sources(files, &options.timezone);
    analyze_records(summary, query, options)
}

/// Run the post-load part of a query on an already loaded record set.
pub fn analyze_records(
    summary: LoadSummary,
    query: &EnergyQuery,
    options: &EngineOptions,
) -> Result<QueryOutcome> {
    let summary = summary.require_records()?;

    info!(
        "Query: start={:?}, end={:?}, region={:?}, aggregation={}",
        query.start, query.end, query.region, query.aggregation
    );

    let mut warnings = Vec::new();
    let (level, level_warning) = AggregationLevel::resolve(&query.aggregation);
    if let Some(w) = level_warning {
        warn!("{}", w);
        warnings.push(w);
    }

    let mut stats = QueryStats {
        files_requested: summary.files_requested,
        files_loaded: summary.files_loaded,
        records_loaded: summary.records.len(),
        records_skipped_cells: summary.report.total_skipped(),
        ..QueryStats::default()
    };
    for failure in &summary.failures {
        warnings.push(format!("{}: {}", failure.path.display(), failure.reason));
    }

    let filtered = query.window().apply(summary.records);
    stats.records_after_filter = filtered.len();

    if filtered.is_empty() {
        info!("No records left after filtering");
        return Ok(QueryOutcome {
            level,
            level_table: Vec::new(),
            monthly_table: Vec::new(),
            warnings,
            stats,
        });
    }

    let level_table = LevelAggregator::aggregate(&filtered, level);

    let categorized: Vec<CategorizedRecord> = filtered.iter().map(categorize).collect();
    let monthly = MonthlyRollup::rollup(&categorized, options.incomplete_months);
    stats.incomplete_months_dropped = monthly.filtered;
    stats.monthly_fell_back = monthly.fell_back;

    info!(
        "Produced {} {} rows and {} monthly rows from {} records",
        level_table.len(),
        level,
        monthly.rows.len(),
        filtered.len()
    );

    Ok(QueryOutcome {
        level,
        level_table,
        monthly_table: monthly.rows,
        warnings,
        stats,
    })
}
