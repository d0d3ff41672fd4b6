//! On-disk layout of the index.
//!
//! Everything lives in one sled tree so a commit can be applied as a single
//! atomic batch. Keys are prefixed by kind:
//!
//! | prefix | key                                   | value                |
//! |--------|---------------------------------------|----------------------|
//! | `m`    | (none)                                | [`IndexMeta`]        |
//! | `p`    | field tag, term bytes                 | `Vec<Posting>`       |
//! | `s`    | doc id (BE)                           | [`StoredFields`]     |
//! | `n`    | point tag, sortable value (BE), doc id | empty              |

use crate::analyzer::AnalyzerConfig;
use crate::book::{date_to_millis, format_date, millis_to_date};
use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Date;

pub type DocId = u32;

pub const FORMAT_VERSION: u32 = 1;

/// Indexed fields that hold postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Title,
    Author,
    Contents,
    BookDescription,
    EditorRecommendation,
    Isbn,
    Category,
}

impl Field {
    /// Fields searched by an unscoped query.
    pub const SEARCHABLE: [Field; 5] = [
        Field::Title,
        Field::Author,
        Field::Contents,
        Field::BookDescription,
        Field::EditorRecommendation,
    ];

    pub const ALL: [Field; 7] = [
        Field::Title,
        Field::Author,
        Field::Contents,
        Field::BookDescription,
        Field::EditorRecommendation,
        Field::Isbn,
        Field::Category,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Contents => "contents",
            Field::BookDescription => "bookDescription",
            Field::EditorRecommendation => "editorRecommendation",
            Field::Isbn => "isbn",
            Field::Category => "category",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Exact fields index the whole trimmed value as one term.
    pub fn is_exact(self) -> bool {
        matches!(self, Field::Isbn | Field::Category)
    }

    fn tag(self) -> u8 {
        match self {
            Field::Title => 1,
            Field::Author => 2,
            Field::Contents => 3,
            Field::BookDescription => 4,
            Field::EditorRecommendation => 5,
            Field::Isbn => 6,
            Field::Category => 7,
        }
    }
}

/// Numeric fields indexed for range lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointField {
    SalePrice,
    PublicationDate,
}

impl PointField {
    pub const ALL: [PointField; 2] = [PointField::SalePrice, PointField::PublicationDate];

    pub fn name(self) -> &'static str {
        match self {
            PointField::SalePrice => "salePrice",
            PointField::PublicationDate => "publicationDate",
        }
    }

    pub fn from_name(name: &str) -> Option<PointField> {
        PointField::ALL.into_iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }

    fn tag(self) -> u8 {
        match self {
            PointField::SalePrice => 1,
            PointField::PublicationDate => 2,
        }
    }
}

/// Inclusive range over one point field; `None` bounds are open.
/// Bounds are kept in their order-preserving encoded form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRange {
    pub field: PointField,
    pub lo: Option<u64>,
    pub hi: Option<u64>,
}

impl PointRange {
    pub fn price(lo: Option<f64>, hi: Option<f64>) -> Self {
        Self { field: PointField::SalePrice, lo: lo.map(sortable_f64), hi: hi.map(sortable_f64) }
    }

    pub fn date(lo: Option<Date>, hi: Option<Date>) -> Self {
        Self {
            field: PointField::PublicationDate,
            lo: lo.map(|d| sortable_i64(date_to_millis(d))),
            hi: hi.map(|d| sortable_i64(date_to_millis(d))),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!((self.lo, self.hi), (Some(lo), Some(hi)) if lo > hi)
    }
}

/// Maps f64 onto u64 so that byte order matches numeric order.
pub fn sortable_f64(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}

pub fn sortable_i64(v: i64) -> u64 {
    (v as u64) ^ (1 << 63)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Token positions within the field, ascending.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn freq(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Values kept in the index for display without the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFields {
    pub isbn: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub sale_price: Option<f64>,
    /// Epoch milliseconds at UTC midnight.
    pub publication_date: Option<i64>,
}

impl StoredFields {
    pub fn publication_date_string(&self) -> Option<String> {
        self.publication_date.and_then(millis_to_date).map(format_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub num_docs: u32,
    pub next_doc_id: DocId,
    pub analyzer: AnalyzerConfig,
    pub created_at: String,
    pub updated_at: String,
}

impl IndexMeta {
    pub fn new(analyzer: AnalyzerConfig) -> Self {
        let now = now_rfc3339();
        Self { version: FORMAT_VERSION, num_docs: 0, next_doc_id: 0, analyzer, created_at: now.clone(), updated_at: now }
    }
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into())
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn store(&self) -> PathBuf {
        self.root.join("store")
    }

    pub fn exists(&self) -> bool {
        self.store().is_dir()
    }
}

pub(crate) mod keys {
    use super::{DocId, Field, PointField};

    pub const META: &[u8] = b"m";
    const POSTING: u8 = b'p';
    const STORED: u8 = b's';
    const POINT: u8 = b'n';

    pub fn posting(field: Field, term: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(2 + term.len());
        key.push(POSTING);
        key.push(field.tag());
        key.extend_from_slice(term.as_bytes());
        key
    }

    pub fn stored(doc_id: DocId) -> [u8; 5] {
        let mut key = [STORED; 5];
        key[1..].copy_from_slice(&doc_id.to_be_bytes());
        key
    }

    pub fn point(field: PointField, value: u64, doc_id: DocId) -> [u8; 14] {
        let mut key = [0u8; 14];
        key[0] = POINT;
        key[1] = field.tag();
        key[2..10].copy_from_slice(&value.to_be_bytes());
        key[10..].copy_from_slice(&doc_id.to_be_bytes());
        key
    }

    pub fn point_doc(key: &[u8]) -> Option<DocId> {
        let tail: [u8; 4] = key.get(10..14)?.try_into().ok()?;
        Some(DocId::from_be_bytes(tail))
    }
}

pub(crate) fn open_db(paths: &IndexPaths) -> Result<sled::Db, StoreError> {
    Ok(sled::open(paths.store())?)
}

pub(crate) fn load_meta(db: &sled::Db) -> Result<Option<IndexMeta>, StoreError> {
    match db.get(keys::META)? {
        Some(bytes) => {
            let meta: IndexMeta = decode(&bytes)?;
            if meta.version != FORMAT_VERSION {
                return Err(StoreError::Version { found: meta.version, expected: FORMAT_VERSION });
            }
            Ok(Some(meta))
        }
        None => Ok(None),
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}
