use booksearch_core::{
    AnalyzerConfig, Book, BookSearcher, DocumentStore, Field, IndexReader, IndexWriter, SearchError,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use time::macros::date;

fn book(isbn: Option<&str>, title: &str) -> Book {
    Book { isbn: isbn.map(String::from), title: Some(title.into()), ..Book::default() }
}

fn index(dir: &Path, books: &[Book]) {
    let mut writer = IndexWriter::open(dir, AnalyzerConfig::default()).unwrap();
    for b in books {
        writer.add_book(b);
    }
    writer.close().unwrap();
}

fn searcher(dir: &Path, books: Vec<Book>) -> BookSearcher {
    index(dir, &books);
    BookSearcher::open(dir, Arc::new(DocumentStore::from_books(books))).unwrap()
}

fn isbns(books: &[Book]) -> Vec<&str> {
    books.iter().filter_map(|b| b.isbn.as_deref()).collect()
}

fn classics() -> Vec<Book> {
    vec![
        Book {
            author: Some("曹雪芹".into()),
            category: Some("文学艺术".into()),
            sale_price: Some(35.0),
            publication_date: Some(date!(1996 - 12 - 01)),
            ..book(Some("9787020002207"), "红楼梦")
        },
        Book {
            author: Some("罗贯中".into()),
            category: Some("文学艺术".into()),
            sale_price: Some(42.5),
            publication_date: Some(date!(1998 - 05 - 01)),
            ..book(Some("9787020008728"), "三国演义")
        },
        Book {
            author: Some("施耐庵".into()),
            contents: Some("第一回 张天师祈禳瘟疫 洪太尉误走妖魔".into()),
            sale_price: Some(39.0),
            ..book(Some("9787020008735"), "水浒传")
        },
        Book {
            author: Some("Steve Klabnik".into()),
            book_description: Some("The official book on the Rust programming language".into()),
            category: Some("计算机类".into()),
            ..book(Some("9781718503106"), "The Rust Programming Language")
        },
    ]
}

#[test]
fn exact_title_finds_only_that_book() {
    let dir = tempdir().unwrap();
    let s = searcher(dir.path(), classics());
    let ranked = s.search_ranked("红楼梦", 10).unwrap();
    assert_eq!(ranked.books.len(), 1);
    assert!(ranked.books[0].score > 0.0);
    assert_eq!(ranked.books[0].book.title.as_deref(), Some("红楼梦"));
    assert!(ranked.books.iter().all(|r| r.book.title.as_deref() != Some("三国演义")));
}

#[test]
fn every_title_finds_its_own_book() {
    let dir = tempdir().unwrap();
    let books = classics();
    let s = searcher(dir.path(), books.clone());
    for b in &books {
        let title = b.title.as_deref().unwrap();
        let found = s.search(title, 20).unwrap();
        assert!(isbns(&found).contains(&b.isbn.as_deref().unwrap()), "title {title:?} missed its book");
    }
}

#[test]
fn blank_and_unknown_queries_return_nothing() {
    let dir = tempdir().unwrap();
    let s = searcher(dir.path(), classics());
    assert!(s.search("", 10).unwrap().is_empty());
    assert!(s.search("   \t\n", 10).unwrap().is_empty());
    assert!(s.search("？！。", 10).unwrap().is_empty());
    assert!(s.search("西游记", 10).unwrap().is_empty());
    assert!(s.search("zzzyx", 10).unwrap().is_empty());
}

#[test]
fn limit_bounds_the_result_count() {
    let dir = tempdir().unwrap();
    let s = searcher(dir.path(), classics());
    let all = s.search("红楼梦 三国演义 水浒传 rust", 10).unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(s.search("红楼梦 三国演义 水浒传 rust", 2).unwrap().len(), 2);
    assert!(s.search("红楼梦 三国演义 水浒传 rust", 0).unwrap().is_empty());
}

#[test]
fn books_without_isbn_never_surface() {
    let dir = tempdir().unwrap();
    let mut books = classics();
    books.push(book(None, "西游记"));
    books.push(book(Some("<UNK>"), "西游记 注释本"));
    books.push(book(Some("unknown"), "西游记 插图本"));
    let s = searcher(dir.path(), books);
    assert_eq!(s.reader().num_docs(), 4);
    assert!(s.search("西游记", 10).unwrap().is_empty());
}

#[test]
fn repeated_queries_are_identical() {
    let dir = tempdir().unwrap();
    let s = searcher(dir.path(), classics());
    let first = s.top_hits("红楼梦 水浒 rust language", 10).unwrap();
    for _ in 0..5 {
        assert_eq!(s.top_hits("红楼梦 水浒 rust language", 10).unwrap(), first);
    }
}

#[test]
fn duplicate_isbn_resolves_to_first_record_once() {
    let dir = tempdir().unwrap();
    let books = vec![
        book(Some("42"), "Rust 编程之道"),
        book(Some("42"), "Rust 权威指南"),
        book(Some("7"), "Go 语言圣经"),
    ];
    let s = searcher(dir.path(), books);
    assert_eq!(s.reader().num_docs(), 3);
    assert_eq!(s.documents().len(), 2);

    let found = s.search("rust", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title.as_deref(), Some("Rust 编程之道"));
    assert_eq!(s.top_hits("rust", 10).unwrap().total, 2);
}

#[test]
fn deduplication_still_fills_the_limit() {
    let dir = tempdir().unwrap();
    let mut books = Vec::new();
    for i in 0..5 {
        books.push(book(Some("dup"), &format!("Rust 笔记 第{i}册 rust rust")));
    }
    books.push(book(Some("a"), "Rust"));
    books.push(book(Some("b"), "rust in action"));
    let s = searcher(dir.path(), books);
    let found = s.search("rust", 3).unwrap();
    let mut ids = isbns(&found);
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "dup"]);
}

#[test]
fn stronger_matches_rank_first_and_ties_follow_doc_order() {
    let dir = tempdir().unwrap();
    let books = vec![
        Book { book_description: Some("一本关于 rust 的书".into()), ..book(Some("1"), "系统编程") },
        Book { contents: Some("rust rust rust".into()), ..book(Some("2"), "Rust 实战") },
        Book { book_description: Some("一本关于 rust 的书".into()), ..book(Some("3"), "系统编程") },
    ];
    let s = searcher(dir.path(), books);
    let found = s.search("rust", 10).unwrap();
    assert_eq!(isbns(&found), vec!["2", "1", "3"]);
}

#[test]
fn field_weights_change_the_order() {
    let dir = tempdir().unwrap();
    let books = vec![
        Book { author: Some("Rust".into()), ..book(Some("1"), "无关") },
        Book { author: Some("无名".into()), ..book(Some("2"), "Rust") },
    ];
    index(dir.path(), &books);
    let mut weights = booksearch_core::FieldWeights::default();
    weights.set(Field::Author, 3.0);
    let s = BookSearcher::open(dir.path(), Arc::new(DocumentStore::from_books(books)))
        .unwrap()
        .with_weights(weights);
    assert_eq!(isbns(&s.search("rust", 10).unwrap()), vec!["1", "2"]);
}

#[test]
fn phrases_require_adjacent_terms() {
    let dir = tempdir().unwrap();
    let books = vec![
        book(Some("1"), "红楼梦"),
        Book { contents: Some("楼梦红楼".into()), ..book(Some("2"), "杂记") },
    ];
    let s = searcher(dir.path(), books);
    assert_eq!(isbns(&s.search("红楼梦", 10).unwrap()), vec!["1", "2"]);
    assert_eq!(isbns(&s.search("\"红楼梦\"", 10).unwrap()), vec!["1"]);
}

#[test]
fn field_scoped_boolean_and_range_queries() {
    let dir = tempdir().unwrap();
    let s = searcher(dir.path(), classics());

    assert_eq!(isbns(&s.search("author:罗贯中", 10).unwrap()), vec!["9787020008728"]);
    assert_eq!(isbns(&s.search("isbn:9787020008735", 10).unwrap()), vec!["9787020008735"]);
    assert_eq!(s.search("category:文学艺术", 10).unwrap().len(), 2);

    let both = s.search("红楼梦 三国演义 -title:三国", 10).unwrap();
    assert_eq!(isbns(&both), vec!["9787020002207"]);

    let required = s.search("+category:文学艺术 +salePrice:[40 TO *]", 10).unwrap();
    assert_eq!(isbns(&required), vec!["9787020008728"]);

    let dated = s.search("publicationDate:[1990-01-01 TO 1997-01-01]", 10).unwrap();
    assert_eq!(isbns(&dated), vec!["9787020002207"]);

    assert!(s.search("红楼梦 AND 三国演义", 10).unwrap().is_empty());
}

#[test]
fn syntax_errors_are_recoverable() {
    let dir = tempdir().unwrap();
    let s = searcher(dir.path(), classics());
    assert!(matches!(s.search("\"红楼梦", 10), Err(SearchError::Parse(_))));
    assert_eq!(s.search("红楼梦", 10).unwrap().len(), 1);
}

#[test]
fn hits_missing_from_document_store_are_dropped() {
    let dir = tempdir().unwrap();
    let books = classics();
    index(dir.path(), &books);
    let partial = DocumentStore::from_books(books.into_iter().filter(|b| b.title.as_deref() != Some("红楼梦")));
    let s = BookSearcher::open(dir.path(), Arc::new(partial)).unwrap();
    assert!(s.search("红楼梦", 10).unwrap().is_empty());
    assert_eq!(s.top_hits("红楼梦", 10).unwrap().hits.len(), 1);
    assert_eq!(s.search("三国演义", 10).unwrap().len(), 1);
}

#[test]
fn appending_keeps_existing_ids() {
    let dir = tempdir().unwrap();
    let books = classics();
    index(dir.path(), &books[..2]);
    let before = IndexReader::open(dir.path()).unwrap().stored(1).unwrap().unwrap();
    index(dir.path(), &books[2..]);

    let s = BookSearcher::open(dir.path(), Arc::new(DocumentStore::from_books(books))).unwrap();
    assert_eq!(s.reader().num_docs(), 4);
    assert_eq!(s.reader().stored(1).unwrap().unwrap(), before);
    assert_eq!(s.search("水浒传", 10).unwrap().len(), 1);
    assert_eq!(s.search("三国演义", 10).unwrap().len(), 1);
}

#[test]
fn concurrent_queries_share_one_searcher() {
    let dir = tempdir().unwrap();
    let s = Arc::new(searcher(dir.path(), classics()));
    let expected = s.top_hits("红楼梦 rust", 10).unwrap();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let s = Arc::clone(&s);
            let expected = expected.clone();
            scope.spawn(move || {
                for _ in 0..20 {
                    assert_eq!(s.top_hits("红楼梦 rust", 10).unwrap(), expected);
                }
            });
        }
    });
}

#[test]
fn titles_made_of_operator_words_are_found_when_quoted() {
    let dir = tempdir().unwrap();
    let books = vec![
        book(Some("1"), "To Be OR NOT To Be"),
        book(Some("2"), "-273℃的爱"),
        Book { author: Some("[美]海明威".into()), ..book(Some("3"), "老人与海") },
        book(Some("4"), "Rust AND"),
    ];
    let s = searcher(dir.path(), books);

    assert_eq!(isbns(&s.search("\"To Be OR NOT To Be\"", 10).unwrap()), vec!["1"]);
    assert_eq!(isbns(&s.search("\"-273℃的爱\"", 10).unwrap()), vec!["2"]);
    assert_eq!(isbns(&s.search("author:[美]海明威", 10).unwrap()), vec!["3"]);
    assert_eq!(isbns(&s.search("\"Rust AND\"", 10).unwrap()), vec!["4"]);

    match s.search("Rust AND", 10) {
        Err(SearchError::Parse(e)) => assert!(e.to_string().contains("quote")),
        other => panic!("expected a parse error, got {other:?}"),
    }
}
