//! Source discovery and loading for energy-mix.
//!
//! Year documents live at `<data_dir>/<YYYY>/power-data.json`. Loading is
//! best-effort: a missing, unreadable or malformed year is logged and left
//! out so the remaining years can still answer the query.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDateTime};
use energy_core::error::{EnergyError, Result};
use energy_core::models::EnergyRecord;
use energy_core::settings::SOURCE_FILE_NAME;
use energy_core::time_utils::TimezoneHandler;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::normalizer::{normalize_document, NormalizeReport, NormalizedDocument};

fn year_dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}$").expect("regex is valid"))
}

// ── Catalog ───────────────────────────────────────────────────────────────────

/// One year's document inside the data directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearSource {
    pub year: i32,
    pub path: PathBuf,
}

/// Find all `<YYYY>` directories directly under `data_dir`, sorted by year.
///
/// The returned paths point at the expected document whether or not it
/// exists; a missing file is reported when it is loaded.
pub fn find_year_sources(data_dir: &Path) -> Vec<YearSource> {
    if !data_dir.exists() {
        warn!("Data path does not exist: {}", data_dir.display());
        return Vec::new();
    }

    let mut sources: Vec<YearSource> = walkdir::WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?;
            if !year_dir_pattern().is_match(name) {
                return None;
            }
            let year = name.parse().ok()?;
            Some(YearSource {
                year,
                path: entry.path().join(SOURCE_FILE_NAME),
            })
        })
        .collect();

    sources.sort();
    sources
}

/// `true` when `year` can hold records inside `[start, end)`.
pub fn year_in_window(
    year: i32,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> bool {
    start.map_or(true, |s| s.year() <= year) && end.map_or(true, |e| e.year() >= year)
}

/// Source files under `data_dir` whose year overlaps the window, in year order.
pub fn select_sources(
    data_dir: &Path,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Vec<PathBuf> {
    let selected: Vec<PathBuf> = find_year_sources(data_dir)
        .into_iter()
        .filter(|s| year_in_window(s.year, start, end))
        .map(|s| s.path)
        .collect();

    info!(
        "Selected {} source file(s) from {}",
        selected.len(),
        data_dir.display()
    );
    selected
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Read, parse and normalize one source document.
pub fn load_source(path: &Path, tz: &TimezoneHandler) -> Result<NormalizedDocument> {
    let content = std::fs::read_to_string(path).map_err(|source| EnergyError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(path, &content, tz)
}

/// Parse and normalize the already-read `content` of the document at `path`.
pub fn parse_source(path: &Path, content: &str, tz: &TimezoneHandler) -> Result<NormalizedDocument> {
    let doc: serde_json::Value = serde_json::from_str(content)?;
    normalize_document(path, &doc, tz)
}

/// A source that contributed nothing, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Concatenated records from several sources.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub records: Vec<EnergyRecord>,
    pub files_requested: usize,
    pub files_loaded: usize,
    pub failures: Vec<SourceFailure>,
    pub report: NormalizeReport,
}

impl LoadSummary {
    pub fn new(files_requested: usize) -> Self {
        Self {
            files_requested,
            ..Self::default()
        }
    }

    /// Fold one source's load result into the summary.
    ///
    /// Errors are logged and recorded as failures, never propagated. Errors
    /// that are not specific to the source (a crashed load task, say) are
    /// logged at `error!` so they stand out from ordinary missing years.
    pub fn absorb(&mut self, path: &Path, result: Result<NormalizedDocument>) {
        match result {
            Ok(doc) => {
                info!("Loaded {} records from {}", doc.records.len(), path.display());
                if doc.report.total_skipped() > 0 {
                    debug!("{}: skipped {:?}", path.display(), doc.report.skips);
                }
                self.files_loaded += 1;
                self.report.merge(&doc.report);
                self.records.extend(doc.records);
            }
            Err(e) => {
                match &e {
                    EnergyError::FileRead { source, .. }
                        if source.kind() == std::io::ErrorKind::NotFound =>
                    {
                        warn!("File not found: {}", path.display());
                    }
                    _ if e.is_source_local() => {
                        warn!("Error loading '{}': {}", path.display(), e)
                    }
                    _ => error!("Unexpected failure loading '{}': {}", path.display(), e),
                }
                self.failures.push(SourceFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Fail with [`EnergyError::NoData`] when nothing at all was loaded.
    pub fn require_records(self) -> Result<Self> {
        if self.records.is_empty() {
            return Err(EnergyError::NoData {
                files_requested: self.files_requested,
            });
        }
        Ok(self)
    }
}

/// Load every path in order and concatenate the records.
pub fn load_sources(paths: &[PathBuf], tz: &TimezoneHandler) -> LoadSummary {
    info!("Loading data from {} file(s)", paths.len());
    let mut summary = LoadSummary::new(paths.len());
    for path in paths {
        summary.absorb(path, load_source(path, tz));
    }
    debug!(
        "Loaded {} records from {}/{} files",
        summary.records.len(),
        summary.files_loaded,
        summary.files_requested
    );
    summary
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_year(dir: &Path, year: &str, doc: &serde_json::Value) -> PathBuf {
        let year_dir = dir.join(year);
        std::fs::create_dir_all(&year_dir).unwrap();
        let path = year_dir.join(SOURCE_FILE_NAME);
        std::fs::write(&path, doc.to_string()).unwrap();
        path
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_doc() -> serde_json::Value {
        json!({
            "epochs": [1640995200, 1641081600],
            "japan": { "nuclear": [1000, 2000] }
        })
    }

    // ── find_year_sources ─────────────────────────────────────────────────────

    #[test]
    fn test_find_year_sources_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write_year(dir.path(), "2024", &sample_doc());
        write_year(dir.path(), "2022", &sample_doc());
        std::fs::create_dir_all(dir.path().join("backup")).unwrap();
        std::fs::create_dir_all(dir.path().join("20231")).unwrap();
        std::fs::write(dir.path().join("2023"), "not a dir").unwrap();

        let sources = find_year_sources(dir.path());
        let years: Vec<i32> = sources.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2022, 2024]);
        assert!(sources[0].path.ends_with("2022/power-data.json"));
    }

    #[test]
    fn test_find_year_sources_nonexistent_path() {
        let sources = find_year_sources(Path::new("/tmp/does-not-exist-energy-mix-xyz"));
        assert!(sources.is_empty());
    }

    // ── year selection ────────────────────────────────────────────────────────

    #[test]
    fn test_year_in_window() {
        assert!(year_in_window(2022, None, None));
        assert!(year_in_window(2023, Some(day(2023, 6, 1)), None));
        assert!(!year_in_window(2022, Some(day(2023, 6, 1)), None));
        assert!(year_in_window(2024, None, Some(day(2024, 1, 1))));
        assert!(!year_in_window(2025, None, Some(day(2024, 12, 31))));
        assert!(!year_in_window(2022, Some(day(2030, 1, 1)), Some(day(2031, 1, 1))));
    }

    #[test]
    fn test_select_sources_window() {
        let dir = TempDir::new().unwrap();
        for year in ["2022", "2023", "2024"] {
            write_year(dir.path(), year, &sample_doc());
        }

        let all = select_sources(dir.path(), None, None);
        assert_eq!(all.len(), 3);

        let mid = select_sources(dir.path(), Some(day(2023, 3, 1)), Some(day(2023, 9, 1)));
        assert_eq!(mid.len(), 1);
        assert!(mid[0].ends_with("2023/power-data.json"));

        let outside = select_sources(dir.path(), Some(day(2010, 1, 1)), Some(day(2011, 1, 1)));
        assert!(outside.is_empty());
    }

    // ── load_sources ──────────────────────────────────────────────────────────

    #[test]
    fn test_load_sources_concatenates_in_order() {
        let dir = TempDir::new().unwrap();
        let a = write_year(dir.path(), "2022", &sample_doc());
        let b = write_year(
            dir.path(),
            "2023",
            &json!({ "epochs": [1672531200], "japan": { "solar": [3000] } }),
        );

        let summary = load_sources(&[a, b], &TimezoneHandler::utc());
        assert_eq!(summary.records.len(), 3);
        assert_eq!(summary.files_loaded, 2);
        assert!(summary.failures.is_empty());
        assert_eq!(summary.records[2].timestamp, day(2023, 1, 1));
        assert_eq!(summary.records[2].value("solar"), Some(3.0));
        assert_eq!(summary.report.records, 3);
    }

    #[test]
    fn test_load_sources_missing_file_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let good = write_year(dir.path(), "2022", &sample_doc());
        let missing = dir.path().join("2023").join(SOURCE_FILE_NAME);

        let summary = load_sources(&[missing.clone(), good], &TimezoneHandler::utc());
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.files_requested, 2);
        assert_eq!(summary.files_loaded, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].path, missing);
    }

    #[test]
    fn test_load_sources_corrupt_json_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let good = write_year(dir.path(), "2022", &sample_doc());
        let bad_dir = dir.path().join("2023");
        std::fs::create_dir_all(&bad_dir).unwrap();
        let bad = bad_dir.join(SOURCE_FILE_NAME);
        std::fs::write(&bad, "{\"epochs\": [1, 2").unwrap();

        let summary = load_sources(&[good, bad], &TimezoneHandler::utc());
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].reason.contains("Failed to parse JSON"));
    }

    #[test]
    fn test_load_source_malformed_shape() {
        let dir = TempDir::new().unwrap();
        let path = write_year(dir.path(), "2022", &json!({ "japan": {} }));
        let err = load_source(&path, &TimezoneHandler::utc()).unwrap_err();
        assert!(matches!(err, EnergyError::MalformedDocument { .. }));
        assert!(err.is_source_local());
    }

    #[test]
    fn test_parse_source_matches_load_source() {
        let dir = TempDir::new().unwrap();
        let path = write_year(dir.path(), "2022", &sample_doc());
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed = parse_source(&path, &content, &TimezoneHandler::utc()).unwrap();
        let loaded = load_source(&path, &TimezoneHandler::utc()).unwrap();
        assert_eq!(parsed.records, loaded.records);
    }

    #[test]
    fn test_absorb_records_every_failure_kind() {
        let mut summary = LoadSummary::new(2);
        let local = EnergyError::MalformedDocument {
            path: PathBuf::from("2022/power-data.json"),
            reason: "missing `epochs` array".to_string(),
        };
        let crashed = EnergyError::Io(std::io::Error::other("load task panicked"));
        assert!(local.is_source_local());
        assert!(!crashed.is_source_local());

        summary.absorb(Path::new("2022/power-data.json"), Err(local));
        summary.absorb(Path::new("2023/power-data.json"), Err(crashed));
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.files_loaded, 0);
        assert!(summary.failures[1].reason.contains("panicked"));
    }

    #[test]
    fn test_require_records() {
        let summary = LoadSummary::new(2);
        let err = summary.require_records().unwrap_err();
        assert!(matches!(err, EnergyError::NoData { files_requested: 2 }));

        let dir = TempDir::new().unwrap();
        let path = write_year(dir.path(), "2022", &sample_doc());
        let summary = load_sources(&[path], &TimezoneHandler::utc());
        assert!(summary.require_records().is_ok());
    }
}
