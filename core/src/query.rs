//! Query model and parser.
//!
//! Bare words are analyzed and matched against every default field with OR
//! semantics. On top of that a small subset of the classic Lucene syntax is
//! understood: `"phrases"`, `field:value`, `+required`, `-prohibited`,
//! `AND` / `OR` / `NOT`, and `salePrice:[lo TO hi]` style ranges.

use crate::analyzer::Analyzer;
use crate::book::parse_date;
use crate::error::ParseError;
use crate::store::{Field, PointField, PointRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Should,
    Must,
    MustNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseKind {
    /// Matches when any of the fields holds any of the terms.
    Terms { fields: Vec<Field>, terms: Vec<String> },
    /// Matches when the terms occur at consecutive positions in one field.
    Phrase { fields: Vec<Field>, terms: Vec<String> },
    Range(PointRange),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub occur: Occur,
    pub kind: ClauseKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bare(String),
    Quoted(String),
    Range { lo: String, hi: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    And,
    Or,
    Not,
    Unit { modifier: Option<Occur>, field: Option<String>, value: Value },
}

enum Target {
    Text(Field),
    Point(PointField),
}

fn target(name: &str) -> Option<Target> {
    Field::from_name(name)
        .map(Target::Text)
        .or_else(|| PointField::from_name(name).map(Target::Point))
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_until(&mut self, stop: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|c| !stop(c)) {
            self.bump();
        }
        &self.input[start..self.pos]
    }

    /// Consumes a quoted string; the opening quote is the next char.
    fn quoted(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.bump();
        let body = self.take_until(|c| c == '"');
        if self.bump() != Some('"') {
            return Err(ParseError::UnterminatedQuote { pos: start });
        }
        Ok(body.to_string())
    }

    fn range(&mut self, field: &str) -> Result<Value, ParseError> {
        let start = self.pos;
        self.bump();
        let body = self.take_until(|c| c == ']');
        if self.bump() != Some(']') {
            return Err(ParseError::UnterminatedRange { pos: start });
        }
        let parts: Vec<&str> = body.split_whitespace().collect();
        match parts.as_slice() {
            [lo, to, hi] if *to == "TO" => Ok(Value::Range { lo: lo.to_string(), hi: hi.to_string() }),
            _ => Err(ParseError::MalformedRange {
                field: field.to_string(),
                reason: format!("expected [lo TO hi], got [{body}]"),
            }),
        }
    }

    fn next_lexeme(&mut self) -> Result<Option<Lexeme>, ParseError> {
        self.skip_whitespace();
        let Some(first) = self.peek() else {
            return Ok(None);
        };

        let mut modifier = None;
        if first == '+' || first == '-' {
            let mut chars = self.rest().chars();
            chars.next();
            if chars.next().is_some_and(|c| !c.is_whitespace()) {
                modifier = Some(if first == '+' { Occur::Must } else { Occur::MustNot });
                self.bump();
            }
        }

        if self.peek() == Some('"') {
            let text = self.quoted()?;
            return Ok(Some(Lexeme::Unit { modifier, field: None, value: Value::Quoted(text) }));
        }

        let word_start = self.pos;
        let head = self.take_until(|c| c.is_whitespace() || c == ':');
        if let (Some(':'), Some(t)) = (self.peek(), target(head)) {
            self.bump();
            let value = match self.peek() {
                Some('"') => Value::Quoted(self.quoted()?),
                // Text fields only take `[` as a range when it reads like one;
                // otherwise `author:[美]海明威` is just text.
                Some('[') if matches!(t, Target::Point(_)) || looks_like_range(self.rest()) => self.range(head)?,
                Some(c) if !c.is_whitespace() => Value::Bare(self.take_until(char::is_whitespace).to_string()),
                _ => return Err(ParseError::EmptyFieldValue { field: head.to_string() }),
            };
            return Ok(Some(Lexeme::Unit { modifier, field: Some(head.to_string()), value }));
        }

        // Not a field prefix: the whole run up to whitespace is plain text.
        self.pos = word_start;
        let word = self.take_until(char::is_whitespace);
        if modifier.is_none() {
            match word {
                "AND" => return Ok(Some(Lexeme::And)),
                "OR" => return Ok(Some(Lexeme::Or)),
                "NOT" => return Ok(Some(Lexeme::Not)),
                _ => {}
            }
        }
        Ok(Some(Lexeme::Unit { modifier, field: None, value: Value::Bare(word.to_string()) }))
    }
}

/// `[lo TO hi]` at the start of `text`.
fn looks_like_range(text: &str) -> bool {
    let Some(end) = text.find(']') else { return false };
    let parts: Vec<&str> = text[1..end].split_whitespace().collect();
    matches!(parts.as_slice(), [_, "TO", _])
}

/// Turns query strings into [`Query`] values using the index's analyzer.
pub struct QueryParser<'a> {
    analyzer: &'a Analyzer,
    default_fields: Vec<Field>,
}

impl<'a> QueryParser<'a> {
    pub fn new(analyzer: &'a Analyzer, default_fields: &[Field]) -> Self {
        Self { analyzer, default_fields: default_fields.to_vec() }
    }

    pub fn parse(&self, input: &str) -> Result<Query, ParseError> {
        let mut lexer = Lexer::new(input);
        let mut clauses: Vec<Clause> = Vec::new();
        let mut seen_operand = false;
        // Operator waiting for its right-hand operand.
        let mut pending_op: Option<&'static str> = None;
        let mut pending_and = false;
        let mut pending_not = false;
        // Index in `clauses` where the clauses of the latest operand start.
        let mut last_operand = 0;

        while let Some(lexeme) = lexer.next_lexeme()? {
            match lexeme {
                Lexeme::And | Lexeme::Or => {
                    let op = if lexeme == Lexeme::And { "AND" } else { "OR" };
                    if let Some(prev) = pending_op {
                        return Err(ParseError::DanglingOperator { op: prev.to_string() });
                    }
                    if !seen_operand {
                        return Err(ParseError::DanglingOperator { op: op.to_string() });
                    }
                    if lexeme == Lexeme::And {
                        for clause in &mut clauses[last_operand..] {
                            if clause.occur == Occur::Should {
                                clause.occur = Occur::Must;
                            }
                        }
                        pending_and = true;
                    }
                    pending_op = Some(op);
                }
                Lexeme::Not => {
                    if pending_op == Some("NOT") {
                        return Err(ParseError::DanglingOperator { op: "NOT".into() });
                    }
                    pending_not = true;
                    pending_op = Some("NOT");
                }
                Lexeme::Unit { modifier, field, value } => {
                    let occur = modifier.unwrap_or(if pending_not {
                        Occur::MustNot
                    } else if pending_and {
                        Occur::Must
                    } else {
                        Occur::Should
                    });
                    last_operand = clauses.len();
                    if let Some(kind) = self.clause_kind(field.as_deref(), value)? {
                        clauses.push(Clause { occur, kind });
                    }
                    seen_operand = true;
                    pending_op = None;
                    pending_and = false;
                    pending_not = false;
                }
            }
        }
        if let Some(op) = pending_op {
            return Err(ParseError::DanglingOperator { op: op.to_string() });
        }
        Ok(Query { clauses })
    }

    fn clause_kind(&self, field: Option<&str>, value: Value) -> Result<Option<ClauseKind>, ParseError> {
        let Some(name) = field else {
            return Ok(self.text_clause(self.default_fields.clone(), value));
        };
        match target(name) {
            Some(Target::Text(f)) if f.is_exact() => {
                let text = match value {
                    Value::Bare(s) | Value::Quoted(s) => s.trim().to_string(),
                    Value::Range { .. } => return Err(ParseError::RangeOnTextField { field: name.to_string() }),
                };
                if text.is_empty() {
                    return Err(ParseError::EmptyFieldValue { field: name.to_string() });
                }
                Ok(Some(ClauseKind::Terms { fields: vec![f], terms: vec![text] }))
            }
            Some(Target::Text(f)) => {
                if matches!(value, Value::Range { .. }) {
                    return Err(ParseError::RangeOnTextField { field: name.to_string() });
                }
                Ok(self.text_clause(vec![f], value))
            }
            Some(Target::Point(p)) => {
                let (lo, hi) = match value {
                    Value::Range { lo, hi } => (lo, hi),
                    Value::Bare(s) | Value::Quoted(s) => (s.clone(), s),
                };
                Ok(Some(ClauseKind::Range(point_range(p, &lo, &hi)?)))
            }
            None => Ok(self.text_clause(self.default_fields.clone(), value)),
        }
    }

    fn text_clause(&self, fields: Vec<Field>, value: Value) -> Option<ClauseKind> {
        let (text, quoted) = match value {
            Value::Bare(s) => (s, false),
            Value::Quoted(s) => (s, true),
            Value::Range { lo, hi } => (format!("{lo} {hi}"), false),
        };
        let terms = self.analyzer.terms(&text);
        match terms.len() {
            0 => None,
            n if quoted && n > 1 => Some(ClauseKind::Phrase { fields, terms }),
            _ => Some(ClauseKind::Terms { fields, terms }),
        }
    }
}

fn point_range(field: PointField, lo: &str, hi: &str) -> Result<PointRange, ParseError> {
    let malformed = |bound: &str| ParseError::MalformedRange {
        field: field.name().to_string(),
        reason: format!("cannot parse bound {bound:?}"),
    };
    match field {
        PointField::SalePrice => {
            let parse = |s: &str| -> Result<Option<f64>, ParseError> {
                if s == "*" {
                    return Ok(None);
                }
                s.trim().parse::<f64>().map(Some).map_err(|_| malformed(s))
            };
            Ok(PointRange::price(parse(lo)?, parse(hi)?))
        }
        PointField::PublicationDate => {
            let parse = |s: &str| -> Result<_, ParseError> {
                if s == "*" {
                    return Ok(None);
                }
                parse_date(s).map(Some).ok_or_else(|| malformed(s))
            };
            Ok(PointRange::date(parse(lo)?, parse(hi)?))
        }
    }
}
