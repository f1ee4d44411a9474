//! Async query service.
//!
//! Resolves the year documents for a query window, reads them concurrently,
//! parses them on tokio's blocking pool and hands the concatenated records to
//! the engine. Each call works on its own freshly loaded data; nothing is
//! cached.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use energy_core::error::{EnergyError, Result};
use energy_core::settings::Settings;
use energy_core::time_utils::TimezoneHandler;
use energy_data::analysis::{analyze_records, EngineOptions, EnergyQuery, QueryOutcome};
use energy_data::normalizer::NormalizedDocument;
use energy_data::reader::{parse_source, select_sources, LoadSummary};
use tokio::task::JoinHandle;
use tokio::time::Instant;

// ── Runtime driver ────────────────────────────────────────────────────────────

/// Run `future` to completion on a fresh multi-threaded runtime.
///
/// A read that missed its deadline may still be parked on a blocking thread
/// (a FIFO with no writer, a hung network mount). Such threads are given at
/// most `grace` after `future` finishes and are then abandoned, so the
/// process can exit.
pub fn run_with_grace<F: Future>(future: F, grace: Duration) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

// ── EnergyService ─────────────────────────────────────────────────────────────

/// Entry point used by callers that already parsed their request parameters.
///
/// # Example
/// ```no_run
/// use energy_data::analysis::{EngineOptions, EnergyQuery};
/// use energy_runtime::service::EnergyService;
///
/// # async fn run() -> energy_core::Result<()> {
/// let service = EnergyService::new("/srv/power", EngineOptions::default());
/// let query = EnergyQuery { aggregation: "daily".into(), ..EnergyQuery::default() };
/// let outcome = service.query(&query).await?;
/// println!("{} rows", outcome.level_table.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EnergyService {
    /// Root holding one `<YYYY>/power-data.json` per year.
    data_dir: PathBuf,
    options: EngineOptions,
    /// Load deadline shared by every file of one query, measured from the
    /// start of the load; a file that misses it counts as unavailable.
    io_timeout: Option<Duration>,
}

impl EnergyService {
    pub fn new(data_dir: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self {
            data_dir: data_dir.into(),
            options,
            io_timeout: None,
        }
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let service = Self::new(
            settings.resolve_data_dir(),
            EngineOptions::from_settings(settings)?,
        );
        Ok(match settings.io_timeout_secs {
            Some(secs) => service.with_io_timeout(Duration::from_secs(secs)),
            None => service,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Answer one query.
    ///
    /// Returns `NoData` when no selected year produced a record, and an empty
    /// [`QueryOutcome`] when records were loaded but none matched the window.
    pub async fn query(&self, query: &EnergyQuery) -> Result<QueryOutcome> {
        let files = select_sources(&self.data_dir, query.start, query.end);
        let summary = self.load_concurrently(&files).await;

        let query = query.clone();
        let options = self.options;
        tokio::task::spawn_blocking(move || analyze_records(summary, &query, &options))
            .await
            .map_err(|e| EnergyError::Io(std::io::Error::other(e)))?
    }

    /// Load `files` in parallel and concatenate them in the given order.
    ///
    /// Completion order never affects the result. With an I/O timeout set,
    /// every file must finish within the same window starting now.
    pub async fn load_concurrently(&self, files: &[PathBuf]) -> LoadSummary {
        let deadline = self.io_timeout.map(|limit| Instant::now() + limit);
        let tz = self.options.timezone;
        let handles: Vec<JoinHandle<Result<NormalizedDocument>>> = files
            .iter()
            .map(|path| tokio::spawn(load_document(path.clone(), tz)))
            .collect();

        let mut summary = LoadSummary::new(files.len());
        for (path, handle) in files.iter().zip(handles) {
            let result = self.await_load(path, handle, deadline).await;
            summary.absorb(path, result);
        }

        tracing::debug!(
            loaded = summary.files_loaded,
            requested = summary.files_requested,
            records = summary.records.len(),
            "concurrent load finished"
        );
        summary
    }

    // ── Private helpers ───────────────────────────────────────────────────

    async fn await_load(
        &self,
        path: &Path,
        mut handle: JoinHandle<Result<NormalizedDocument>>,
        deadline: Option<Instant>,
    ) -> Result<NormalizedDocument> {
        let joined = match (deadline, self.io_timeout) {
            (Some(deadline), Some(limit)) => {
                match tokio::time::timeout_at(deadline, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        handle.abort();
                        return Err(EnergyError::FileRead {
                            path: path.to_path_buf(),
                            source: std::io::Error::new(
                                std::io::ErrorKind::TimedOut,
                                format!("load exceeded {:?}", limit),
                            ),
                        });
                    }
                }
            }
            _ => handle.await,
        };

        joined.map_err(|e| EnergyError::Io(std::io::Error::other(e)))?
    }
}

/// Read one document asynchronously, then parse and normalize it on the
/// blocking pool.
async fn load_document(path: PathBuf, tz: TimezoneHandler) -> Result<NormalizedDocument> {
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| EnergyError::FileRead {
            path: path.clone(),
            source,
        })?;

    tokio::task::spawn_blocking(move || parse_source(&path, &content, &tz))
        .await
        .map_err(|e| EnergyError::Io(std::io::Error::other(e)))?
}

// ── Tests ─────────────────────────────────────────────────────────────────────
