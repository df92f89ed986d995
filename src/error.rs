//! Error types for the momentum scanner.

use thiserror::Error;

/// Result type alias using the scanner error type.
pub type Result<T> = std::result::Result<T, ScannerError>;

/// Unified error type for the scanner service.
#[derive(Error, Debug)]
pub enum ScannerError {
    /// A ticker lacks enough price history for one of the horizons;
    /// the ticker is excluded from scoring, the scan continues.
    #[error("Insufficient history for {ticker}: {horizon} window needs {needed} closes, have {have}")]
    InsufficientHistory {
        ticker: String,
        horizon: &'static str,
        needed: usize,
        have: usize,
    },

    /// Caller-supplied scan parameters failed validation.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// A job was started while another is still running.
    #[error("A job is already running")]
    AlreadyRunning,

    /// A scan was requested before any data refresh has populated the cache.
    #[error("No market data available, run a refresh first")]
    NoDataAvailable,

    /// A result was requested but no scan has completed successfully.
    #[error("No scan result available")]
    NoResultAvailable,

    /// The upstream market-data API failed during a refresh.
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local SQLite store error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScannerError {
    /// Whether this error only excludes a single ticker from scoring
    /// rather than failing the surrounding job.
    pub const fn is_exclusion(&self) -> bool {
        matches!(self, Self::InsufficientHistory { .. })
    }

    /// Whether this error is a synchronous rejection that never
    /// touches shared job state.
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameters(_) | Self::AlreadyRunning | Self::NoDataAvailable
        )
    }

    /// HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidParameters(_) => 400,
            Self::NoDataAvailable | Self::NoResultAvailable => 404,
            Self::AlreadyRunning => 409,
            Self::UpstreamFetch(_) => 502,
            Self::InsufficientHistory { .. }
            | Self::Config(_)
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Json(_) => 500,
        }
    }
}
