//! Text analysis shared by indexing and querying.
//!
//! Text is NFKC-normalized and lowercased, then split into runs of Han
//! ideographs and words of other letters/digits. Han runs are handed to a
//! [`Segmenter`]; other words are optionally stemmed. Punctuation and
//! whitespace never produce tokens.

use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex =
        Regex::new(r"(?u)\p{Han}+|[\p{L}\p{N}&&\P{Han}][\p{L}\p{N}_'&&\P{Han}]*").expect("valid regex");
    static ref HAN: Regex = Regex::new(r"^\p{Han}").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Splits one run of consecutive Han ideographs into terms.
pub trait Segmenter: Send + Sync {
    fn segment(&self, run: &str, out: &mut Vec<String>);
}

/// Overlapping character bigrams; a lone ideograph is kept as a unigram.
#[derive(Debug, Default, Clone, Copy)]
pub struct BigramSegmenter;

impl Segmenter for BigramSegmenter {
    fn segment(&self, run: &str, out: &mut Vec<String>) {
        let chars: Vec<char> = run.chars().collect();
        if chars.len() == 1 {
            out.push(run.to_string());
            return;
        }
        for pair in chars.windows(2) {
            out.push(pair.iter().collect());
        }
    }
}

/// One term per ideograph.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnigramSegmenter;

impl Segmenter for UnigramSegmenter {
    fn segment(&self, run: &str, out: &mut Vec<String>) {
        out.extend(run.chars().map(String::from));
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterKind {
    #[default]
    Bigram,
    Unigram,
}

impl SegmenterKind {
    fn build(self) -> Box<dyn Segmenter> {
        match self {
            SegmenterKind::Bigram => Box::new(BigramSegmenter),
            SegmenterKind::Unigram => Box::new(UnigramSegmenter),
        }
    }
}

impl std::str::FromStr for SegmenterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bigram" => Ok(SegmenterKind::Bigram),
            "unigram" => Ok(SegmenterKind::Unigram),
            other => Err(format!("unknown segmenter {other:?} (expected bigram or unigram)")),
        }
    }
}

/// Persisted with the index so readers analyze queries exactly as documents
/// were analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub segmenter: SegmenterKind,
    pub stem: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { segmenter: SegmenterKind::Bigram, stem: true }
    }
}

pub struct Analyzer {
    config: AnalyzerConfig,
    segmenter: Box<dyn Segmenter>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer").field("config", &self.config).finish()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config, segmenter: config.segmenter.build() }
    }

    pub fn config(&self) -> AnalyzerConfig {
        self.config
    }

    /// Tokenize into (term, position); positions count emitted tokens.
    pub fn tokenize(&self, text: &str) -> Vec<(String, u32)> {
        self.terms(text)
            .into_iter()
            .enumerate()
            .map(|(pos, term)| (term, pos as u32))
            .collect()
    }

    pub fn terms(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut out = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let word = mat.as_str();
            if HAN.is_match(word) {
                self.segmenter.segment(word, &mut out);
                continue;
            }
            let word = strip_possessive(word).trim_end_matches('\'');
            if word.is_empty() {
                continue;
            }
            if self.config.stem {
                out.push(STEMMER.stem(word).into_owned());
            } else {
                out.push(word.to_string());
            }
        }
        out
    }
}

fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s").unwrap_or(word)
}
