use crate::book::Book;
use crate::docstore::DocumentStore;
use crate::error::{ParseError, SearchError, StoreError};
use crate::executor::{Executor, FieldWeights, Hit, TopHits};
use crate::query::{Query, QueryParser};
use crate::reader::IndexReader;
use crate::store::{DocId, Field};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct RankedBook {
    pub doc_id: DocId,
    pub score: f32,
    pub book: Book,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// Matching index documents before limiting and hydration.
    pub total: usize,
    pub books: Vec<RankedBook>,
}

enum Dropped {
    NoStoredFields(DocId),
    Unresolved(DocId, String),
}

/// Query entry point: parses, ranks against the index, and hydrates hits
/// from the document store.
pub struct BookSearcher {
    reader: IndexReader,
    documents: Arc<DocumentStore>,
    fields: Vec<Field>,
    weights: FieldWeights,
}

impl BookSearcher {
    pub fn open<P: AsRef<Path>>(index_dir: P, documents: Arc<DocumentStore>) -> Result<Self, StoreError> {
        Ok(Self::new(IndexReader::open(index_dir)?, documents))
    }

    pub fn new(reader: IndexReader, documents: Arc<DocumentStore>) -> Self {
        Self { reader, documents, fields: Field::SEARCHABLE.to_vec(), weights: FieldWeights::default() }
    }

    pub fn with_weights(mut self, weights: FieldWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_default_fields(mut self, fields: &[Field]) -> Self {
        self.fields = fields.to_vec();
        self
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn parse(&self, query: &str) -> Result<Query, ParseError> {
        QueryParser::new(self.reader.analyzer(), &self.fields).parse(query)
    }

    /// Ranked index hits without hydration.
    pub fn top_hits(&self, query: &str, limit: usize) -> Result<TopHits, SearchError> {
        let query = self.parse(query)?;
        if query.is_empty() || limit == 0 {
            return Ok(TopHits::default());
        }
        Ok(Executor::new(&self.reader, &self.weights).execute(&query, limit)?)
    }

    /// Full record for an index document, if both sides know it.
    pub fn resolve_doc(&self, doc_id: DocId) -> Result<Option<&Book>, StoreError> {
        Ok(self.reader.stored(doc_id)?.and_then(|s| self.documents.resolve(&s.isbn)))
    }

    /// Up to `limit` distinct books, best first, with their scores.
    pub fn search_ranked(&self, query: &str, limit: usize) -> Result<SearchResults, SearchError> {
        let query = self.parse(query)?;
        if query.is_empty() || limit == 0 {
            return Ok(SearchResults::default());
        }
        let executor = Executor::new(&self.reader, &self.weights);
        let mut fetch = limit;
        loop {
            let top = executor.execute(&query, fetch)?;
            let exhausted = top.hits.len() >= top.total;
            let (books, dropped) = self.hydrate(&top.hits, limit)?;
            // Duplicates or dropped hits can leave us short; widen and retry.
            if books.len() == limit || exhausted {
                for d in dropped {
                    match d {
                        Dropped::NoStoredFields(doc_id) => {
                            tracing::warn!(doc_id, "hit has no stored fields, dropping")
                        }
                        Dropped::Unresolved(doc_id, isbn) => {
                            tracing::warn!(doc_id, %isbn, "isbn not found in document store, dropping hit")
                        }
                    }
                }
                return Ok(SearchResults { total: top.total, books });
            }
            fetch = fetch.saturating_mul(2).min(top.total);
        }
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Book>, SearchError> {
        Ok(self.search_ranked(query, limit)?.books.into_iter().map(|r| r.book).collect())
    }

    fn hydrate(&self, hits: &[Hit], limit: usize) -> Result<(Vec<RankedBook>, Vec<Dropped>), StoreError> {
        let mut books = Vec::with_capacity(limit.min(hits.len()));
        let mut dropped = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for hit in hits {
            if books.len() == limit {
                break;
            }
            let Some(stored) = self.reader.stored(hit.doc_id)? else {
                dropped.push(Dropped::NoStoredFields(hit.doc_id));
                continue;
            };
            if !seen.insert(stored.isbn.clone()) {
                tracing::debug!(doc_id = hit.doc_id, isbn = %stored.isbn, "skipping repeated isbn");
                continue;
            }
            match self.documents.resolve(&stored.isbn) {
                Some(book) => books.push(RankedBook { doc_id: hit.doc_id, score: hit.score, book: book.clone() }),
                None => dropped.push(Dropped::Unresolved(hit.doc_id, stored.isbn)),
            }
        }
        Ok((books, dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searcher_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<BookSearcher>();
    }
}
