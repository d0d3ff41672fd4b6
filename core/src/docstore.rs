use crate::book::Book;
use crate::error::RecordsError;
use crate::records::load_collection;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

/// isbn → full record, built once at start-up and read-only afterwards.
///
/// When a collection repeats an isbn the first record is kept.
#[derive(Debug, Default)]
pub struct DocumentStore {
    by_isbn: HashMap<String, Book>,
}

impl DocumentStore {
    pub fn from_books<I: IntoIterator<Item = Book>>(books: I) -> Self {
        let mut by_isbn = HashMap::new();
        let mut duplicates = 0usize;
        let mut unkeyed = 0usize;
        for book in books {
            let Some(isbn) = book.indexable_isbn().map(str::to_string) else {
                unkeyed += 1;
                continue;
            };
            match by_isbn.entry(isbn) {
                Entry::Vacant(slot) => {
                    slot.insert(book);
                }
                Entry::Occupied(slot) => {
                    duplicates += 1;
                    tracing::debug!(isbn = %slot.key(), "duplicate isbn, keeping first record");
                }
            }
        }
        if duplicates > 0 {
            tracing::warn!(duplicates, "record collection repeats isbns; first occurrence kept");
        }
        if unkeyed > 0 {
            tracing::info!(unkeyed, "records without isbn left out of the document store");
        }
        Self { by_isbn }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecordsError> {
        let books = load_collection(path)?;
        let store = Self::from_books(books);
        tracing::info!(books = store.len(), "document store loaded");
        Ok(store)
    }

    pub fn resolve(&self, isbn: &str) -> Option<&Book> {
        self.by_isbn.get(isbn.trim())
    }

    pub fn len(&self) -> usize {
        self.by_isbn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_isbn.is_empty()
    }
}
