use std::path::PathBuf;

use thiserror::Error;

/// Validation and contract errors exposed by `quotesnap-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("market date must be YYYY-MM-DD: '{value}'")]
    InvalidMarketDate { value: String },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },

    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("unknown time zone '{value}'")]
    InvalidTimeZone { value: String },
}

/// File-system and document errors raised by the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to move staged file into '{path}': {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while reading ticker lists or building the listed universe.
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("tickers file not found: '{0}'")]
    TickersNotFound(PathBuf),

    #[error("no tickers found in '{0}'")]
    Empty(PathBuf),

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to fetch listed companies: {0}")]
    Fetch(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Universe(#[from] UniverseError),
}
