pub mod analyzer;
pub mod book;
pub mod config;
pub mod docstore;
pub mod error;
pub mod executor;
pub mod query;
pub mod reader;
pub mod records;
pub mod searcher;
pub mod store;
pub mod writer;

pub use analyzer::{Analyzer, AnalyzerConfig, SegmenterKind};
pub use book::Book;
pub use config::Settings;
pub use docstore::DocumentStore;
pub use error::{ParseError, RecordsError, SearchError, StoreError};
pub use executor::{FieldWeights, Hit, TopHits};
pub use query::{Query, QueryParser};
pub use reader::IndexReader;
pub use searcher::{BookSearcher, RankedBook, SearchResults};
pub use store::{DocId, Field, IndexMeta, PointField, PointRange, Posting, StoredFields};
pub use writer::IndexWriter;
