use crate::error::StoreError;
use crate::query::{Clause, ClauseKind, Occur, Query};
use crate::reader::IndexReader;
use crate::store::{DocId, Field, Posting};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub score: f32,
}

impl Eq for Hit {}

impl PartialOrd for Hit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hit {
    /// Better hits compare greater: higher score, then lower doc id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopHits {
    /// Number of matching documents before the limit was applied.
    pub total: usize,
    /// Best first.
    pub hits: Vec<Hit>,
}

/// Per-field score multipliers; unlisted fields weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldWeights(BTreeMap<Field, f32>);

impl FieldWeights {
    pub fn get(&self, field: Field) -> f32 {
        self.0.get(&field).copied().unwrap_or(1.0)
    }

    pub fn set(&mut self, field: Field, weight: f32) {
        self.0.insert(field, weight);
    }

    /// Parses `field=weight`, e.g. `title=2.5`.
    pub fn parse_assignment(&mut self, text: &str) -> Result<(), String> {
        let (name, weight) = text.split_once('=').ok_or_else(|| format!("expected field=weight, got {text:?}"))?;
        let field = Field::from_name(name.trim()).ok_or_else(|| format!("unknown field {name:?}"))?;
        let weight: f32 = weight.trim().parse().map_err(|_| format!("invalid weight {weight:?}"))?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(format!("weight must be a non-negative number, got {weight}"));
        }
        self.set(field, weight);
        Ok(())
    }
}

fn tf(freq: u32) -> f32 {
    if freq > 0 {
        1.0 + (freq as f32).ln()
    } else {
        0.0
    }
}

fn idf(num_docs: u32, doc_freq: u32) -> f32 {
    (1.0 + num_docs.max(1) as f32 / doc_freq.max(1) as f32).ln()
}

/// Constant contribution of a matching range clause.
const RANGE_SCORE: f32 = 1.0;

/// Resolves queries against a reader and ranks the matches.
pub struct Executor<'a> {
    reader: &'a IndexReader,
    weights: &'a FieldWeights,
}

impl<'a> Executor<'a> {
    pub fn new(reader: &'a IndexReader, weights: &'a FieldWeights) -> Self {
        Self { reader, weights }
    }

    /// Scores every matching document and keeps the best `limit`.
    pub fn execute(&self, query: &Query, limit: usize) -> Result<TopHits, StoreError> {
        let mut scores: HashMap<DocId, f32> = HashMap::new();
        let mut required: Option<HashSet<DocId>> = None;
        let mut optional: HashSet<DocId> = HashSet::new();
        let mut excluded: HashSet<DocId> = HashSet::new();

        for clause in &query.clauses {
            let matched = self.clause_scores(clause)?;
            match clause.occur {
                Occur::MustNot => excluded.extend(matched.keys().copied()),
                Occur::Must => {
                    let docs: HashSet<DocId> = matched.keys().copied().collect();
                    required = Some(match required {
                        Some(prev) => prev.intersection(&docs).copied().collect(),
                        None => docs,
                    });
                    add_scores(&mut scores, &matched);
                }
                Occur::Should => {
                    optional.extend(matched.keys().copied());
                    add_scores(&mut scores, &matched);
                }
            }
        }

        let candidates = required.unwrap_or(optional);
        let total = candidates.iter().filter(|d| !excluded.contains(d)).count();
        let hits = top_k(
            candidates
                .into_iter()
                .filter(|d| !excluded.contains(d))
                .map(|doc_id| Hit { doc_id, score: scores.get(&doc_id).copied().unwrap_or(0.0) }),
            limit,
        );
        tracing::debug!(clauses = query.clauses.len(), total, returned = hits.len(), "executed query");
        Ok(TopHits { total, hits })
    }

    fn clause_scores(&self, clause: &Clause) -> Result<BTreeMap<DocId, f32>, StoreError> {
        let mut out = BTreeMap::new();
        match &clause.kind {
            ClauseKind::Terms { fields, terms } => {
                for &field in fields {
                    let weight = self.weights.get(field);
                    for term in terms {
                        let postings = self.reader.postings(field, term)?;
                        if postings.is_empty() {
                            continue;
                        }
                        let idf = idf(self.reader.num_docs(), postings.len() as u32);
                        for p in postings.iter() {
                            *out.entry(p.doc_id).or_insert(0.0) += tf(p.freq()) * idf * weight;
                        }
                    }
                }
            }
            ClauseKind::Phrase { fields, terms } => {
                for &field in fields {
                    self.phrase_scores(field, terms, &mut out)?;
                }
            }
            ClauseKind::Range(range) => {
                for doc_id in self.reader.point_range(range)? {
                    out.insert(doc_id, RANGE_SCORE);
                }
            }
        }
        Ok(out)
    }

    fn phrase_scores(&self, field: Field, terms: &[String], out: &mut BTreeMap<DocId, f32>) -> Result<(), StoreError> {
        let mut lists = Vec::with_capacity(terms.len());
        for term in terms {
            let postings = self.reader.postings(field, term)?;
            if postings.is_empty() {
                return Ok(());
            }
            lists.push(postings);
        }
        let idf_sum: f32 = lists.iter().map(|l| idf(self.reader.num_docs(), l.len() as u32)).sum();
        let weight = self.weights.get(field);

        'docs: for first in lists[0].iter() {
            let mut rest: Vec<&Posting> = Vec::with_capacity(lists.len() - 1);
            for list in &lists[1..] {
                match list.binary_search_by_key(&first.doc_id, |p| p.doc_id) {
                    Ok(i) => rest.push(&list[i]),
                    Err(_) => continue 'docs,
                }
            }
            let freq = first
                .positions
                .iter()
                .filter(|&&start| {
                    rest.iter()
                        .enumerate()
                        .all(|(i, p)| p.positions.binary_search(&(start + i as u32 + 1)).is_ok())
                })
                .count() as u32;
            if freq > 0 {
                *out.entry(first.doc_id).or_insert(0.0) += tf(freq) * idf_sum * weight;
            }
        }
        Ok(())
    }
}

fn add_scores(scores: &mut HashMap<DocId, f32>, matched: &BTreeMap<DocId, f32>) {
    for (&doc_id, &score) in matched {
        *scores.entry(doc_id).or_insert(0.0) += score;
    }
}

/// Best `k` hits, best first, using a min-heap of size `k`.
pub fn top_k(hits: impl IntoIterator<Item = Hit>, k: usize) -> Vec<Hit> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Reverse<Hit>> = BinaryHeap::with_capacity(k + 1);
    for hit in hits {
        if heap.len() < k {
            heap.push(Reverse(hit));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if hit > *worst {
                heap.pop();
                heap.push(Reverse(hit));
            }
        }
    }
    // Ascending order of Reverse<Hit> is descending order of Hit.
    heap.into_sorted_vec().into_iter().map(|Reverse(h)| h).collect()
}
