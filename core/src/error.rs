use std::path::PathBuf;
use thiserror::Error;

use crate::analyzer::AnalyzerConfig;

/// Malformed query syntax. Recoverable: the caller reports it and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated quote starting at byte {pos}")]
    UnterminatedQuote { pos: usize },

    #[error("unterminated range starting at byte {pos}")]
    UnterminatedRange { pos: usize },

    #[error("malformed range for {field}: {reason}")]
    MalformedRange { field: String, reason: String },

    #[error("field {field} does not support range queries")]
    RangeOnTextField { field: String },

    #[error("missing value after {field}:")]
    EmptyFieldValue { field: String },

    #[error("operator {op} is missing an operand (quote it to search the word itself)")]
    DanglingOperator { op: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage engine error: {0}")]
    Sled(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("no index found at {}", .0.display())]
    Missing(PathBuf),

    #[error("unsupported index format version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("index was built with analyzer {stored:?}, refusing to append with {requested:?}")]
    AnalyzerMismatch {
        stored: AnalyzerConfig,
        requested: AnalyzerConfig,
    },

    #[error("corrupt key in index store: {0}")]
    CorruptKey(String),
}

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("cannot read record collection {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record collection {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no record collection found at {}", .0.display())]
    NotFound(PathBuf),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
