//! Field extraction from a book item page.

use anyhow::{anyhow, Result};
use booksearch_core::book::parse_date;
use booksearch_core::Book;
use scraper::{ElementRef, Html, Selector};

type Setter = fn(&mut Book, &str);

/// Detail-table label to record field.
static LABELS: &[(&str, Setter)] = &[
    ("商品编码（ISBN）", |b, v| b.isbn = non_empty(v)),
    ("出版社", |b, v| b.publisher = non_empty(v)),
    ("作者", |b, v| b.author = non_empty(v)),
    ("出版时间", |b, v| b.publication_date = parse_date(v)),
    ("正文语种", |b, v| b.language = non_empty(v)),
];

pub struct Selectors {
    title: Selector,
    breadcrumb: Selector,
    sale_price: Selector,
    original_price: Selector,
    table_body: Selector,
    label: Selector,
    value: Selector,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

impl Selectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title: selector("#js-item-name")?,
            breadcrumb: selector("ol.breadcrumb a")?,
            sale_price: selector("#js-item-price")?,
            original_price: selector("#js-item-originalPrice")?,
            table_body: selector("table.attribute-tab tbody")?,
            label: selector("td.main-parameter")?,
            value: selector("td.parameter-espercial")?,
        })
    }
}

fn non_empty(text: &str) -> Option<String> {
    let t = text.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Text content with whitespace runs collapsed.
fn text(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).next().map(text).and_then(|t| non_empty(&t))
}

/// `￥35.60` -> 35.6; anything unparseable or non-positive is absent.
pub fn parse_price(text: &str) -> Option<f64> {
    let t = text.trim().trim_start_matches(['￥', '¥']).trim();
    t.parse::<f64>().ok().filter(|p| p.is_finite() && *p > 0.0)
}

/// Label/value pairs of the detail table, in page order.
pub fn table_rows(doc: &Html, sel: &Selectors) -> Vec<(String, String)> {
    let Some(body) = doc.select(&sel.table_body).next() else {
        tracing::debug!("page has no detail table");
        return Vec::new();
    };
    body.children()
        .filter_map(ElementRef::wrap)
        .filter(|row| row.value().name() == "tr")
        .filter_map(|row| {
            let mut labels = row.select(&sel.label);
            let mut values = row.select(&sel.value);
            match (labels.next(), labels.next(), values.next(), values.next()) {
                (Some(l), None, Some(v), None) => Some((text(l), text(v))),
                _ => None,
            }
        })
        .collect()
}

/// Builds a record from an item page. Missing or malformed parts stay absent.
pub fn parse_book(html: &str, sel: &Selectors) -> Book {
    let doc = Html::parse_document(html);
    let mut book = Book {
        title: first_text(&doc, &sel.title),
        category: first_text(&doc, &sel.breadcrumb),
        sale_price: first_text(&doc, &sel.sale_price).and_then(|t| parse_price(&t)),
        original_price: first_text(&doc, &sel.original_price).and_then(|t| parse_price(&t)),
        ..Book::default()
    };
    for (label, value) in table_rows(&doc, sel) {
        if let Some((_, set)) = LABELS.iter().find(|(l, _)| *l == label) {
            set(&mut book, &value);
        }
    }
    book
}
