//! Line-oriented search loop behind the `book-shell` binary.

use booksearch_core::book::format_date;
use booksearch_core::{Book, BookSearcher, SearchError};
use std::io::{self, BufRead, Write};

const RULE: &str = "------------------------------------------------------------";

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn price(value: Option<f64>) -> String {
    value.map(|p| format!("¥{p:.2}")).unwrap_or_else(|| "-".into())
}

fn date(book: &Book) -> String {
    book.publication_date.map(format_date).unwrap_or_else(|| "-".into())
}

/// One-entry summary shown in the result list.
pub fn summary(rank: usize, score: f32, book: &Book) -> String {
    let mut line = format!(
        "[{rank}] {title}  (score {score:.3})\n    author: {author}\n    isbn: {isbn}\n    publisher: {publisher} ({date})\n    price: {sale}",
        title = or_dash(book.title.as_deref()),
        author = or_dash(book.author.as_deref()),
        isbn = or_dash(book.isbn.as_deref()),
        publisher = or_dash(book.publisher.as_deref()),
        date = date(book),
        sale = price(book.sale_price),
    );
    if book.original_price.is_some() {
        line.push_str(&format!(" (list {})", price(book.original_price)));
    }
    line
}

/// Every attribute of a record, long text included.
pub fn detail(book: &Book) -> String {
    let rows = [
        ("title", or_dash(book.title.as_deref()).to_string()),
        ("isbn", or_dash(book.isbn.as_deref()).to_string()),
        ("author", or_dash(book.author.as_deref()).to_string()),
        ("language", or_dash(book.language.as_deref()).to_string()),
        ("publisher", or_dash(book.publisher.as_deref()).to_string()),
        ("published", date(book)),
        ("category", or_dash(book.category.as_deref()).to_string()),
        ("sale price", price(book.sale_price)),
        ("list price", price(book.original_price)),
        ("description", or_dash(book.book_description.as_deref()).to_string()),
        ("about the author", or_dash(book.author_description.as_deref()).to_string()),
        ("editor's note", or_dash(book.editor_recommendation.as_deref()).to_string()),
        ("contents", or_dash(book.contents.as_deref()).to_string()),
    ];
    let mut out = String::new();
    for (label, value) in rows {
        out.push_str(&format!("{label}: {value}\n"));
    }
    out
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Runs until `:quit` or end of input.
pub fn run<R: BufRead, W: Write>(searcher: &BookSearcher, limit: usize, mut input: R, mut out: W) -> io::Result<()> {
    loop {
        writeln!(out, "{RULE}")?;
        write!(out, "query (:quit to exit)> ")?;
        out.flush()?;
        let Some(query) = read_line(&mut input)? else { break };
        if query.eq_ignore_ascii_case(":quit") {
            writeln!(out, "bye")?;
            break;
        }
        if query.is_empty() {
            writeln!(out, "enter a keyword to search")?;
            continue;
        }

        let results = match searcher.search_ranked(&query, limit) {
            Ok(r) => r,
            Err(SearchError::Parse(e)) => {
                writeln!(out, "query error: {e}")?;
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, %query, "search failed");
                writeln!(out, "search failed: {e}")?;
                continue;
            }
        };
        if results.books.is_empty() {
            writeln!(out, "no matching books, try other keywords")?;
            continue;
        }
        writeln!(out, "{} of {} matches", results.books.len(), results.total)?;
        for (i, r) in results.books.iter().enumerate() {
            writeln!(out, "{}", summary(i + 1, r.score, &r.book))?;
        }

        loop {
            write!(out, "number for details (:skip to continue)> ")?;
            out.flush()?;
            let Some(choice) = read_line(&mut input)? else { return Ok(()) };
            if choice.is_empty() || choice == ":skip" {
                break;
            }
            match choice.parse::<usize>() {
                Ok(n) if (1..=results.books.len()).contains(&n) => {
                    writeln!(out, "{RULE}")?;
                    write!(out, "{}", detail(&results.books[n - 1].book))?;
                    break;
                }
                _ => continue,
            }
        }
    }
    Ok(())
}
