use crate::executor::FieldWeights;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Results returned when the caller does not ask for a count.
pub const DEFAULT_LIMIT: usize = 20;
/// Upper bound on results per request accepted by front ends.
pub const MAX_LIMIT: usize = 100;
/// Item pages fetched per crawl when not overridden.
pub const MAX_PAGES: usize = 10;

/// Named configuration values shared by the binaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub records_path: PathBuf,
    pub index_dir: PathBuf,
    pub default_limit: usize,
    pub max_pages: usize,
    pub field_weights: FieldWeights,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            records_path: PathBuf::from("./data/books.json"),
            index_dir: PathBuf::from("./data/index"),
            default_limit: DEFAULT_LIMIT,
            max_pages: MAX_PAGES,
            field_weights: FieldWeights::default(),
        }
    }
}

impl Settings {
    /// Cap a requested result count at `MAX_LIMIT`, falling back to
    /// the default when none was given.
    pub fn limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(MAX_LIMIT)
    }
}
