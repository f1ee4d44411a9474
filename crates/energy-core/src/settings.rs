use chrono::NaiveDateTime;
use clap::Parser;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::IncompleteMonthPolicy;
use crate::time_utils::{parse_bound, TimezoneHandler};

/// Name of the per-year document inside each `<data_dir>/<YYYY>/` directory.
pub const SOURCE_FILE_NAME: &str = "power-data.json";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Energy generation mix rollups from per-year JSON time series
#[derive(Parser, Debug, Clone)]
#[command(
    name = "energy-mix",
    about = "Energy generation mix rollups from per-year JSON time series",
    version
)]
pub struct Settings {
    /// Directory containing one `<YYYY>/power-data.json` per year
    #[arg(long, env = "ENERGY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Inclusive lower bound (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    pub start: Option<String>,

    /// Exclusive upper bound (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    pub end: Option<String>,

    /// Only keep records for this region
    #[arg(long)]
    pub region: Option<String>,

    /// Aggregation level: hourly, daily, weekly or monthly
    #[arg(long, default_value = "hourly")]
    pub aggregation: String,

    /// Timezone used to turn epochs into local time (auto-detected if not specified)
    #[arg(long, default_value = "auto", env = "ENERGY_TIMEZONE")]
    pub timezone: String,

    /// What to do when every month of a multi-month window is incomplete
    #[arg(long, value_enum, default_value_t = IncompleteMonthPolicy::Drop)]
    pub incomplete_months: IncompleteMonthPolicy,

    /// Give up on a source file that takes longer than this to load
    #[arg(long)]
    pub io_timeout_secs: Option<u64>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Pretty-print the JSON response
    #[arg(long)]
    pub pretty: bool,
}

impl Settings {
    /// Parse the process arguments, exiting with usage on error.
    pub fn parse_args() -> Self {
        Settings::parse()
    }

    /// Parse from an explicit argument list (the first element is the binary name).
    pub fn from_args<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::try_parse_from(args)
    }

    /// The data directory: `--data-dir` / `ENERGY_DATA_DIR` when given,
    /// otherwise `<platform data dir>/energy-mix`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("energy-mix")
    }

    pub fn start_bound(&self) -> Result<Option<NaiveDateTime>> {
        self.start.as_deref().map(parse_bound).transpose()
    }

    pub fn end_bound(&self) -> Result<Option<NaiveDateTime>> {
        self.end.as_deref().map(parse_bound).transpose()
    }

    pub fn timezone_handler(&self) -> Result<TimezoneHandler> {
        TimezoneHandler::resolve(&self.timezone)
    }
}
