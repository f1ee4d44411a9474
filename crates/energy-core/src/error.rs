use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the energy-mix engine.
#[derive(Error, Debug)]
pub enum EnergyError {
    /// A source file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A document parsed as JSON but does not have the expected shape.
    #[error("Malformed document {path}: {reason}")]
    MalformedDocument { path: PathBuf, reason: String },

    /// Every requested source was loaded and none of them produced a record.
    #[error("No data found in {files_requested} requested source file(s)")]
    NoData { files_requested: usize },

    /// A date or date-time bound did not match any recognised format.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A timezone name is not a recognised IANA identifier.
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EnergyError {
    /// `true` for errors that only remove one source's contribution.
    ///
    /// The loader logs these as warnings and anything else as an error;
    /// either way the source is recorded as a failure and loading continues.
    pub fn is_source_local(&self) -> bool {
        matches!(
            self,
            EnergyError::FileRead { .. }
                | EnergyError::JsonParse(_)
                | EnergyError::MalformedDocument { .. }
        )
    }
}

/// Convenience alias used throughout the energy crates.
pub type Result<T> = std::result::Result<T, EnergyError>;
