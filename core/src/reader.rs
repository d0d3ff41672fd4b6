use crate::analyzer::Analyzer;
use crate::error::StoreError;
use crate::store::{decode, keys, load_meta, open_db, DocId, Field, IndexMeta, IndexPaths, PointRange, Posting, StoredFields};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const CACHE_CAPACITY: usize = 4096;

/// Read-only view of a committed index.
///
/// All methods take `&self`; one reader can serve any number of concurrent
/// queries. The analyzer is rebuilt from the configuration stored in the
/// index, so queries are analyzed the same way documents were.
pub struct IndexReader {
    db: sled::Db,
    meta: IndexMeta,
    analyzer: Analyzer,
    cache: RwLock<HashMap<(Field, String), Arc<Vec<Posting>>>>,
}

impl IndexReader {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let paths = IndexPaths::new(root);
        if !paths.exists() {
            return Err(StoreError::Missing(paths.root));
        }
        let db = open_db(&paths)?;
        let meta = load_meta(&db)?.ok_or_else(|| StoreError::Missing(paths.root.clone()))?;
        tracing::info!(num_docs = meta.num_docs, analyzer = ?meta.analyzer, "opened index");
        Ok(Self { analyzer: Analyzer::new(meta.analyzer), db, meta, cache: RwLock::new(HashMap::new()) })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn num_docs(&self) -> u32 {
        self.meta.num_docs
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Posting list for a term, ascending by doc id. Unknown terms give an
    /// empty list.
    pub fn postings(&self, field: Field, term: &str) -> Result<Arc<Vec<Posting>>, StoreError> {
        let cache_key = (field, term.to_string());
        if let Some(hit) = self.cache.read().get(&cache_key) {
            return Ok(hit.clone());
        }
        let list: Vec<Posting> = match self.db.get(keys::posting(field, term))? {
            Some(bytes) => decode(&bytes)?,
            None => return Ok(Arc::new(Vec::new())),
        };
        let list = Arc::new(list);
        let mut cache = self.cache.write();
        if cache.len() >= CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(cache_key, list.clone());
        Ok(list)
    }

    pub fn doc_freq(&self, field: Field, term: &str) -> Result<u32, StoreError> {
        Ok(self.postings(field, term)?.len() as u32)
    }

    pub fn stored(&self, doc_id: DocId) -> Result<Option<StoredFields>, StoreError> {
        match self.db.get(keys::stored(doc_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Documents whose point value falls inside the range, ascending by id.
    pub fn point_range(&self, range: &PointRange) -> Result<Vec<DocId>, StoreError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let lo = keys::point(range.field, range.lo.unwrap_or(u64::MIN), DocId::MIN);
        let hi = keys::point(range.field, range.hi.unwrap_or(u64::MAX), DocId::MAX);
        let mut docs = Vec::new();
        for entry in self.db.range(lo..=hi) {
            let (key, _) = entry?;
            let doc = keys::point_doc(&key).ok_or_else(|| StoreError::CorruptKey(format!("{:?}", key.as_ref())))?;
            docs.push(doc);
        }
        docs.sort_unstable();
        docs.dedup();
        Ok(docs)
    }
}
