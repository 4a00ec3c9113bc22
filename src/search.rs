use crate::record::{BannerRecord, Candidate, IdGenerator};
use strsim::levenshtein;

/// Cap used for suggestion dropdown call sites.
pub const SUGGESTION_LIMIT: usize = 8;

/// Worst acceptable weighted match score; anything above is not a match.
const SCORE_THRESHOLD: f64 = 0.34;

/// Queries shorter than this never attempt a match.
const MIN_QUERY_LEN: usize = 2;

const NAME_WEIGHT: f64 = 0.6;
const ALT_WEIGHT: f64 = 0.2;
const TAGS_WEIGHT: f64 = 0.2;

/// Rank candidates against a query. An empty query lists everything by
/// recency (newest first); a non-empty query fuzzy-matches over weighted
/// fields and ranks ascending by score, ties broken by original order.
pub fn search(candidates: &[Candidate], query: &str, limit: Option<usize>) -> Vec<Candidate> {
    let query = query.trim().to_lowercase();

    if query.is_empty() {
        let mut indexed: Vec<(usize, &Candidate)> = candidates.iter().enumerate().collect();
        indexed.sort_by(|(ai, a), (bi, b)| {
            b.created_at.cmp(&a.created_at).then(ai.cmp(bi))
        });
        return truncate(indexed.into_iter().map(|(_, c)| c.clone()).collect(), limit);
    }

    if query.chars().count() < MIN_QUERY_LEN {
        return Vec::new();
    }

    let mut hits: Vec<(f64, usize, &Candidate)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| candidate_score(c, &query).map(|score| (score, idx, c)))
        .collect();
    hits.sort_by(|(sa, ia, _), (sb, ib, _)| {
        sa.partial_cmp(sb).unwrap_or(std::cmp::Ordering::Equal).then(ia.cmp(ib))
    });
    truncate(hits.into_iter().map(|(_, _, c)| c.clone()).collect(), limit)
}

fn truncate(mut results: Vec<Candidate>, limit: Option<usize>) -> Vec<Candidate> {
    if let Some(limit) = limit {
        results.truncate(limit);
    }
    results
}

/// Weighted average over the fields that individually matched; `None` when no
/// field comes in under the threshold.
fn candidate_score(candidate: &Candidate, query: &str) -> Option<f64> {
    let tags = candidate.tags.join(" ");
    let fields = [
        (candidate.name.as_str(), NAME_WEIGHT),
        (candidate.alt.as_str(), ALT_WEIGHT),
        (tags.as_str(), TAGS_WEIGHT),
    ];

    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (text, weight) in fields {
        if let Some(score) = field_score(text, query) {
            if score <= SCORE_THRESHOLD {
                weighted += score * weight;
                total_weight += weight;
            }
        }
    }

    (total_weight > 0.0).then(|| weighted / total_weight)
}

/// Best score for one field: a substring hit anywhere counts as exact (match
/// position is irrelevant), otherwise the closest whitespace token by
/// normalized edit distance.
fn field_score(text: &str, query: &str) -> Option<f64> {
    let text = text.to_lowercase();
    if text.trim().is_empty() {
        return None;
    }
    if text.contains(query) {
        return Some(0.0);
    }
    text.split_whitespace()
        .map(|word| normalized_distance(word, query))
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))))
}

fn normalized_distance(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count()).max(1);
    levenshtein(a, b) as f64 / longest as f64
}

/// Ordered, deduplicated set of records chosen for preview/export, together
/// with the working list that backs it.
#[derive(Debug, Default)]
pub struct Selection {
    records: Vec<BannerRecord>,
    stack: Vec<u64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<BannerRecord>) -> Self {
        Self {
            records,
            stack: Vec::new(),
        }
    }

    /// Materialize a candidate (minting an id for catalog rows), add it to
    /// the working list when absent, and push its id onto the stack unless
    /// already stacked. Re-selecting the same record is a no-op for the
    /// stack, which never holds duplicate ids.
    pub fn select(&mut self, candidate: &Candidate, ids: &mut IdGenerator) -> &BannerRecord {
        let record = candidate.materialize(ids);
        let id = record.id;
        let pos = match self.records.iter().position(|r| r.id == id) {
            Some(pos) => pos,
            None => {
                self.records.push(record);
                self.records.len() - 1
            }
        };
        if !self.stack.contains(&id) {
            self.stack.push(id);
        }
        &self.records[pos]
    }

    /// Drop a record from both the stack and the working list.
    pub fn remove(&mut self, id: u64) {
        self.stack.retain(|&stacked| stacked != id);
        self.records.retain(|r| r.id != id);
    }

    /// Reset the stack to empty; the working list keeps its entries.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn records(&self) -> &[BannerRecord] {
        &self.records
    }

    /// Stacked records in selection order.
    pub fn stacked(&self) -> Vec<&BannerRecord> {
        self.stack
            .iter()
            .filter_map(|id| self.records.iter().find(|r| r.id == *id))
            .collect()
    }
}
