use crate::analyzer::{Analyzer, AnalyzerConfig};
use crate::book::Book;
use crate::error::StoreError;
use crate::store::{
    decode, encode, keys, load_meta, now_rfc3339, open_db, sortable_f64, sortable_i64, DocId, Field, IndexMeta,
    IndexPaths, PointField, Posting, StoredFields,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Documents added since the last commit.
#[derive(Default)]
struct Pending {
    postings: BTreeMap<(Field, String), Vec<Posting>>,
    stored: Vec<(DocId, StoredFields)>,
    points: Vec<(PointField, u64, DocId)>,
    docs: u32,
}

/// Single writer over an index directory.
///
/// Opening takes the storage engine's lock on the directory, so no other
/// writer or reader can open the same index while this one is alive.
/// Nothing is visible on disk until [`IndexWriter::commit`]; dropping the
/// writer discards uncommitted documents.
pub struct IndexWriter {
    db: sled::Db,
    analyzer: Analyzer,
    meta: IndexMeta,
    pending: Pending,
}

impl IndexWriter {
    /// Open an existing index for appending, or create an empty one.
    ///
    /// The store directory stays locked while the writer lives: another
    /// writer or a reader opening it fails with `StoreError::Sled`.
    pub fn open<P: AsRef<Path>>(root: P, config: AnalyzerConfig) -> Result<Self, StoreError> {
        let paths = IndexPaths::new(root);
        std::fs::create_dir_all(&paths.root)?;
        let db = open_db(&paths)?;
        let meta = match load_meta(&db)? {
            Some(meta) => {
                if meta.analyzer != config {
                    return Err(StoreError::AnalyzerMismatch { stored: meta.analyzer, requested: config });
                }
                tracing::info!(num_docs = meta.num_docs, next_doc_id = meta.next_doc_id, "appending to existing index");
                meta
            }
            None => {
                let meta = IndexMeta::new(config);
                db.insert(keys::META, encode(&meta)?)?;
                db.flush()?;
                tracing::info!(root = %paths.root.display(), "created new index");
                meta
            }
        };
        Ok(Self { db, analyzer: Analyzer::new(config), meta, pending: Pending::default() })
    }

    /// Discard any index at `root` and start an empty one.
    pub fn create<P: AsRef<Path>>(root: P, config: AnalyzerConfig) -> Result<Self, StoreError> {
        let paths = IndexPaths::new(root.as_ref());
        if paths.exists() {
            std::fs::remove_dir_all(paths.store())?;
        }
        Self::open(root, config)
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn pending_docs(&self) -> u32 {
        self.pending.docs
    }

    /// Buffer one book. Returns the assigned id, or `None` when the book has
    /// no usable isbn and was skipped.
    pub fn add_book(&mut self, book: &Book) -> Option<DocId> {
        let isbn = match book.indexable_isbn() {
            Some(isbn) => isbn.to_string(),
            None => {
                tracing::debug!(title = ?book.title, "skipping book without isbn");
                return None;
            }
        };
        let doc_id = self.meta.next_doc_id;
        self.meta.next_doc_id += 1;

        let text_fields = [
            (Field::Title, &book.title),
            (Field::Author, &book.author),
            (Field::Contents, &book.contents),
            (Field::BookDescription, &book.book_description),
            (Field::EditorRecommendation, &book.editor_recommendation),
        ];
        for (field, value) in text_fields {
            if let Some(text) = value {
                self.add_text(field, doc_id, text);
            }
        }

        self.add_exact(Field::Isbn, doc_id, &isbn);
        if let Some(category) = book.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            self.add_exact(Field::Category, doc_id, category);
        }

        if let Some(price) = book.sale_price {
            self.pending.points.push((PointField::SalePrice, sortable_f64(price), doc_id));
        }
        let publication_date = book.publication_millis();
        if let Some(millis) = publication_date {
            self.pending.points.push((PointField::PublicationDate, sortable_i64(millis), doc_id));
        }

        let stored = StoredFields {
            isbn,
            title: book.title.clone(),
            author: book.author.clone(),
            category: book.category.clone(),
            sale_price: book.sale_price,
            publication_date,
        };
        self.pending.stored.push((doc_id, stored));
        self.pending.docs += 1;
        Some(doc_id)
    }

    fn add_text(&mut self, field: Field, doc_id: DocId, text: &str) {
        let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
        for (term, pos) in self.analyzer.tokenize(text) {
            positions.entry(term).or_default().push(pos);
        }
        for (term, positions) in positions {
            self.pending.postings.entry((field, term)).or_default().push(Posting { doc_id, positions });
        }
    }

    fn add_exact(&mut self, field: Field, doc_id: DocId, value: &str) {
        self.pending
            .postings
            .entry((field, value.to_string()))
            .or_default()
            .push(Posting { doc_id, positions: vec![0] });
    }

    /// Make all buffered documents durable in one atomic batch.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        if self.pending.docs == 0 {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        let mut batch = sled::Batch::default();

        let terms = pending.postings.len();
        for ((field, term), mut list) in pending.postings {
            let key = keys::posting(field, &term);
            // New ids are always above committed ones, so appending keeps the list sorted.
            let mut merged: Vec<Posting> = match self.db.get(&key)? {
                Some(bytes) => decode(&bytes)?,
                None => Vec::new(),
            };
            merged.append(&mut list);
            batch.insert(key, encode(&merged)?);
        }
        for (doc_id, stored) in &pending.stored {
            batch.insert(&keys::stored(*doc_id)[..], encode(stored)?);
        }
        for (field, value, doc_id) in &pending.points {
            batch.insert(&keys::point(*field, *value, *doc_id)[..], Vec::<u8>::new());
        }

        let mut meta = self.meta.clone();
        meta.num_docs += pending.docs;
        meta.updated_at = now_rfc3339();
        batch.insert(keys::META, encode(&meta)?);

        self.db.apply_batch(batch)?;
        self.db.flush()?;
        self.meta = meta;
        tracing::debug!(docs = pending.docs, terms, total_docs = self.meta.num_docs, "committed batch");
        Ok(())
    }

    /// Commit outstanding documents and release the index.
    pub fn close(mut self) -> Result<IndexMeta, StoreError> {
        self.commit()?;
        tracing::info!(num_docs = self.meta.num_docs, "index writer closed");
        Ok(self.meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn book(isbn: Option<&str>, title: &str) -> Book {
        Book { isbn: isbn.map(String::from), title: Some(title.into()), ..Book::default() }
    }

    #[test]
    fn assigns_dense_ids_and_skips_missing_isbn() {
        let dir = tempdir().unwrap();
        let mut w = IndexWriter::open(dir.path(), AnalyzerConfig::default()).unwrap();
        assert_eq!(w.add_book(&book(Some("1"), "红楼梦")), Some(0));
        assert_eq!(w.add_book(&book(None, "无名")), None);
        assert_eq!(w.add_book(&book(Some("  "), "空白")), None);
        assert_eq!(w.add_book(&book(Some("2"), "三国演义")), Some(1));
        assert_eq!(w.pending_docs(), 2);
        let meta = w.close().unwrap();
        assert_eq!(meta.num_docs, 2);
        assert_eq!(meta.next_doc_id, 2);
    }

    #[test]
    fn reopening_continues_numbering() {
        let dir = tempdir().unwrap();
        let mut w = IndexWriter::open(dir.path(), AnalyzerConfig::default()).unwrap();
        w.add_book(&book(Some("1"), "a"));
        w.close().unwrap();

        let mut w = IndexWriter::open(dir.path(), AnalyzerConfig::default()).unwrap();
        assert_eq!(w.add_book(&book(Some("1"), "a again")), Some(1));
        assert_eq!(w.close().unwrap().num_docs, 2);
    }

    #[test]
    fn uncommitted_documents_are_discarded() {
        let dir = tempdir().unwrap();
        {
            let mut w = IndexWriter::open(dir.path(), AnalyzerConfig::default()).unwrap();
            w.add_book(&book(Some("1"), "kept"));
            w.commit().unwrap();
            w.add_book(&book(Some("2"), "lost"));
        }
        let w = IndexWriter::open(dir.path(), AnalyzerConfig::default()).unwrap();
        assert_eq!(w.meta().num_docs, 1);
        assert_eq!(w.meta().next_doc_id, 1);
    }

    #[test]
    fn analyzer_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        IndexWriter::open(dir.path(), AnalyzerConfig::default()).unwrap().close().unwrap();
        let other = AnalyzerConfig { stem: false, ..AnalyzerConfig::default() };
        let err = IndexWriter::open(dir.path(), other).err().unwrap();
        assert!(matches!(err, StoreError::AnalyzerMismatch { .. }));
    }

    #[test]
    fn create_discards_existing_index() {
        let dir = tempdir().unwrap();
        let mut w = IndexWriter::open(dir.path(), AnalyzerConfig::default()).unwrap();
        w.add_book(&book(Some("1"), "old"));
        w.close().unwrap();
        let w = IndexWriter::create(dir.path(), AnalyzerConfig::default()).unwrap();
        assert_eq!(w.meta().num_docs, 0);
    }

    #[test]
    fn live_writer_locks_out_other_openers() {
        let dir = tempdir().unwrap();
        let mut w = IndexWriter::open(dir.path(), AnalyzerConfig::default()).unwrap();
        w.add_book(&book(Some("1"), "红楼梦"));
        w.commit().unwrap();

        let second = IndexWriter::open(dir.path(), AnalyzerConfig::default());
        assert!(matches!(second, Err(StoreError::Sled(_))));
        let reader = crate::reader::IndexReader::open(dir.path());
        assert!(matches!(reader, Err(StoreError::Sled(_))));

        drop(w);
        assert_eq!(crate::reader::IndexReader::open(dir.path()).unwrap().num_docs(), 1);
    }
}
