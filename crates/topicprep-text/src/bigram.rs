//! Collocation detection with Dunning's log-likelihood ratio.
//!
//! [`BigramFinder`] accumulates unigram and adjacent-pair counts over a
//! training pass. [`BigramFinder::finish`] ranks the candidates and freezes
//! the reference set into [`Collocations`], which merges reference pairs in
//! fresh token streams.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use topicprep_core::config::BigramConfig;
use topicprep_core::DocIndex;

use crate::stopwords::StopWords;
use crate::tokenize::Token;

#[derive(Debug, Clone, Copy)]
pub struct BigramPolicy {
    /// Minimum number of distinct documents a pair must occur in.
    pub doc_count_threshold: usize,
    /// Maximum occurrences per containing document.
    pub infrequency_ratio: f64,
    /// Size of the reference set.
    pub bigram_limit: usize,
    pub separator: char,
}

impl Default for BigramPolicy {
    fn default() -> Self { Self::from(&BigramConfig::default()) }
}

impl From<&BigramConfig> for BigramPolicy {
    fn from(c: &BigramConfig) -> Self {
        Self {
            doc_count_threshold: c.doc_count_threshold,
            infrequency_ratio: c.infrequency_ratio,
            bigram_limit: c.bigram_limit,
            separator: c.separator,
        }
    }
}

#[derive(Debug, Default)]
struct PairStats {
    count: u64,
    docs: FxHashSet<DocIndex>,
}

/// Ranked candidate pair, as listed in the bigram report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub score: f64,
    pub pair_count: u64,
    pub doc_count: usize,
    pub first: String,
    pub second: String,
}

#[derive(Debug)]
pub struct BigramFinder {
    policy: BigramPolicy,
    halt: StopWords,
    word_count: FxHashMap<String, u64>,
    pair_count: FxHashMap<String, FxHashMap<String, PairStats>>,
    total: u64,
}

impl BigramFinder {
    /// `halt` words are never counted and never paired.
    pub fn new(policy: BigramPolicy, halt: StopWords) -> Self {
        Self { policy, halt, word_count: FxHashMap::default(), pair_count: FxHashMap::default(), total: 0 }
    }

    /// Count one document's unfiltered token stream.
    pub fn train(&mut self, doc: DocIndex, tokens: &[Token]) {
        if tokens.len() < 2 {
            return;
        }
        for (i, token) in tokens.iter().enumerate() {
            if self.halt.contains(&token.text) {
                continue;
            }
            *self.word_count.entry(token.text.clone()).or_insert(0) += 1;
            if let Some(next) = tokens.get(i + 1) {
                if !self.halt.contains(&next.text) {
                    let stats = self
                        .pair_count
                        .entry(token.text.clone())
                        .or_default()
                        .entry(next.text.clone())
                        .or_default();
                    stats.count += 1;
                    stats.docs.insert(doc);
                }
            }
        }
        self.total += tokens.len() as u64;
    }

    pub fn finish(self) -> Collocations {
        let mut candidates = Vec::new();
        for (first, followers) in &self.pair_count {
            for (second, stats) in followers {
                let doc_count = stats.docs.len();
                if doc_count < self.policy.doc_count_threshold {
                    continue;
                }
                if stats.count as f64 / doc_count as f64 > self.policy.infrequency_ratio {
                    continue;
                }
                let Some(score) = self.score(first, second, stats.count) else { continue };
                candidates.push(Candidate {
                    score,
                    pair_count: stats.count,
                    doc_count,
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }
        candidates.sort_by(rank);

        let mut reference: FxHashMap<String, FxHashMap<String, f64>> = FxHashMap::default();
        for c in candidates.iter().take(self.policy.bigram_limit) {
            reference.entry(c.first.clone()).or_default().insert(c.second.clone(), c.score);
        }
        info!(
            candidates = candidates.len(),
            reference = candidates.len().min(self.policy.bigram_limit),
            total_tokens = self.total,
            "ranked collocation candidates"
        );
        Collocations { reference, report: candidates, halt: self.halt, separator: self.policy.separator }
    }

    fn score(&self, first: &str, second: &str, pair: u64) -> Option<f64> {
        let first_count = self.word_count.get(first).copied().unwrap_or(0);
        let second_count = self.word_count.get(second).copied().unwrap_or(0);
        let a = pair as i64;
        let b = second_count as i64 - a;
        let c = first_count as i64 - a;
        let d = self.total as i64 - a;
        log_likelihood(a, b, c, d)
    }
}

fn rank(x: &Candidate, y: &Candidate) -> Ordering {
    y.score
        .total_cmp(&x.score)
        .then_with(|| y.pair_count.cmp(&x.pair_count))
        .then_with(|| x.first.cmp(&y.first))
        .then_with(|| x.second.cmp(&y.second))
}

/// G² for the 2x2 contingency table `[[a, b], [c, d]]`, with the factor of two
/// applied. Zero pair counts, empty margins and negative cells have no score.
pub fn log_likelihood(a: i64, b: i64, c: i64, d: i64) -> Option<f64> {
    if a <= 0 || b < 0 || c < 0 || d < 0 {
        return None;
    }
    let (a, b, c, d) = (a as f64, b as f64, c as f64, d as f64);
    let n = a + b + c + d;
    let rows = [a + b, c + d];
    let cols = [a + c, b + d];
    if rows.iter().chain(cols.iter()).any(|&m| m <= 0.0) {
        return None;
    }
    let cells = [(a, 0, 0), (b, 0, 1), (c, 1, 0), (d, 1, 1)];
    let sum: f64 = cells
        .iter()
        .filter(|(observed, _, _)| *observed > 0.0)
        .map(|&(observed, r, k)| {
            let expected = rows[r] * cols[k] / n;
            observed * (observed / expected).ln()
        })
        .sum();
    Some(2.0 * sum)
}

/// The frozen reference set, ready to merge pairs in new token streams.
#[derive(Debug)]
pub struct Collocations {
    reference: FxHashMap<String, FxHashMap<String, f64>>,
    report: Vec<Candidate>,
    halt: StopWords,
    separator: char,
}

impl Collocations {
    pub fn score(&self, first: &str, second: &str) -> Option<f64> {
        self.reference.get(first).and_then(|f| f.get(second)).copied()
    }

    pub fn contains(&self, first: &str, second: &str) -> bool { self.score(first, second).is_some() }

    /// Every candidate that passed the document filters, best first.
    pub fn report(&self) -> &[Candidate] { &self.report }

    /// Merge reference pairs in an unfiltered token stream cut from `text`.
    ///
    /// Merging is greedy and leftmost-first. Two tokens merge only when
    /// neither is a halt word and exactly one space separates them in
    /// `text`. A chain stops before a word that starts a better-scoring pair
    /// with the word after it, so that pair can merge on its own.
    pub fn combine(&self, tokens: Vec<Token>, text: &str) -> Vec<Token> {
        if self.reference.is_empty() {
            return tokens;
        }
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let mut merged = tokens[i].clone();
            let mut end = i;
            while let Some(link) = self.link_score(&tokens, end, text) {
                if end > i && self.link_score(&tokens, end + 1, text).is_some_and(|next| next > link) {
                    break;
                }
                let next = &tokens[end + 1];
                merged.text.push(self.separator);
                merged.text.push_str(&next.text);
                merged.span.end = next.span.end;
                end += 1;
            }
            if end > i {
                debug!(compound = %merged.text, offset = merged.offset, "merged collocation");
            }
            out.push(merged);
            i = end + 1;
        }
        out
    }

    fn link_score(&self, tokens: &[Token], i: usize, text: &str) -> Option<f64> {
        let (left, right) = (tokens.get(i)?, tokens.get(i + 1)?);
        if self.halt.contains(&left.text) || self.halt.contains(&right.text) {
            return None;
        }
        if text.get(left.span.end..right.span.start) != Some(" ") {
            return None;
        }
        self.score(&left.text, &right.text)
    }
}
