use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Month};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Markers older record files use for "no value".
const UNKNOWN_MARKERS: &[&str] = &["<UNK>", "unknown"];

/// One book record as stored in the record collection.
///
/// Every field except the identity is optional; absent fields are `None`
/// rather than a marker string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(default, deserialize_with = "de_text")]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub publisher: Option<String>,
    #[serde(default, deserialize_with = "de_date", serialize_with = "ser_date")]
    pub publication_date: Option<Date>,
    #[serde(default, deserialize_with = "de_price")]
    pub sale_price: Option<f64>,
    /// `None` when no discount was recorded.
    #[serde(default, deserialize_with = "de_price")]
    pub original_price: Option<f64>,
    #[serde(default, deserialize_with = "de_text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub contents: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub book_description: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub author_description: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub editor_recommendation: Option<String>,
}

impl Book {
    /// The trimmed isbn, or `None` if this record cannot be indexed.
    pub fn indexable_isbn(&self) -> Option<&str> {
        self.isbn.as_deref().and_then(clean_text)
    }

    /// Publication date as epoch milliseconds at UTC midnight.
    pub fn publication_millis(&self) -> Option<i64> {
        self.publication_date.map(date_to_millis)
    }
}

pub fn date_to_millis(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp() * 1000
}

pub fn millis_to_date(millis: i64) -> Option<Date> {
    time::OffsetDateTime::from_unix_timestamp(millis.div_euclid(1000))
        .ok()
        .map(|t| t.date())
}

pub fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text.trim(), DATE_FORMAT).ok()
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_default()
}

fn clean_text(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || UNKNOWN_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed)
    }
}

fn de_text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.filter(|s| clean_text(s).is_some()))
}

fn de_price<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let raw: Option<f64> = Option::deserialize(de)?;
    Ok(raw.filter(|p| p.is_finite() && *p > 0.0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Text(String),
    Parts(i32, u8, u8),
}

fn de_date<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Date>, D::Error> {
    let raw: Option<RawDate> = Option::deserialize(de)?;
    Ok(match raw {
        Some(RawDate::Text(s)) => parse_date(&s),
        Some(RawDate::Parts(y, m, d)) => Month::try_from(m)
            .ok()
            .and_then(|month| Date::from_calendar_date(y, month, d).ok()),
        None => None,
    })
}

fn ser_date<S: Serializer>(date: &Option<Date>, ser: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => ser.serialize_some(&format_date(*d)),
        None => ser.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn unknown_marker_reads_as_absent() {
        let book: Book = serde_json::from_str(
            r#"{"isbn":"<UNK>","title":"红楼梦","author":"<UNK>","salePrice":0.0,"originalPrice":35.5}"#,
        )
        .unwrap();
        assert_eq!(book.isbn, None);
        assert_eq!(book.indexable_isbn(), None);
        assert_eq!(book.title.as_deref(), Some("红楼梦"));
        assert_eq!(book.author, None);
        assert_eq!(book.sale_price, None);
        assert_eq!(book.original_price, Some(35.5));
    }

    #[test]
    fn accepts_both_date_shapes() {
        let a: Book = serde_json::from_str(r#"{"publicationDate":"2019-03-01"}"#).unwrap();
        let b: Book = serde_json::from_str(r#"{"publicationDate":[2019,3,1]}"#).unwrap();
        assert_eq!(a.publication_date, Some(date!(2019 - 03 - 01)));
        assert_eq!(a.publication_date, b.publication_date);

        let bad: Book = serde_json::from_str(r#"{"publicationDate":"someday"}"#).unwrap();
        assert_eq!(bad.publication_date, None);
    }

    #[test]
    fn isbn_is_trimmed() {
        let book = Book { isbn: Some("  9787020002207 ".into()), ..Book::default() };
        assert_eq!(book.indexable_isbn(), Some("9787020002207"));
    }

    #[test]
    fn date_survives_json_and_millis() {
        let book = Book { publication_date: Some(date!(2008 - 07 - 15)), ..Book::default() };
        let json = serde_json::to_string(&book).unwrap();
        assert!(json.contains(r#""publicationDate":"2008-07-15""#));
        let millis = book.publication_millis().unwrap();
        assert_eq!(millis_to_date(millis), book.publication_date);
    }
}
