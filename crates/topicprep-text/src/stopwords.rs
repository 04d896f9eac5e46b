//! Stop-word sets and corpus-driven word exclusion.

use std::fs;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::info;

use topicprep_core::{Corpus, PathContext, Result};

use crate::tokenize::{fold_case, Tokenizer};

pub const ENGLISH: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been", "before", "but", "by",
    "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "having", "he", "her", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "may", "might", "more", "most", "must", "no", "not", "of",
    "on", "or", "our", "shall", "she", "should", "so", "some", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "to", "us", "was", "we", "were", "what", "when", "where",
    "which", "who", "whom", "whose", "why", "will", "with", "would", "you", "your",
];

#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: FxHashSet<String>,
}

impl StopWords {
    pub fn new() -> Self { Self::default() }

    pub fn english() -> Self { Self::from_words(ENGLISH.iter().copied()) }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        set.extend(words);
        set
    }

    /// Every token the tokenizer finds in `text` becomes a stop-word.
    pub fn from_text(text: &str, tokenizer: &Tokenizer) -> Self {
        Self { words: tokenizer.tokens(text).map(|t| t.text).collect() }
    }

    pub fn load(path: &Path, tokenizer: &Tokenizer) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        let words = Self::from_text(&text, tokenizer);
        info!(path = %path.display(), count = words.len(), "loaded stop-words file");
        Ok(words)
    }

    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words.extend(words.into_iter().map(|w| fold_case(w.as_ref())));
    }

    pub fn contains(&self, word: &str) -> bool { self.words.contains(word) }
    pub fn len(&self) -> usize { self.words.len() }
    pub fn is_empty(&self) -> bool { self.words.is_empty() }

    pub fn sorted(&self) -> Vec<&str> {
        let mut words: Vec<&str> = self.words.iter().map(String::as_str).collect();
        words.sort_unstable();
        words
    }
}

/// Highest corpus frequency at which a word counts as too rare to model.
pub fn singleton_threshold(doc_count: usize) -> u64 {
    let magnitude = if doc_count == 0 { 0 } else { doc_count.ilog10() as i64 };
    (magnitude - 2).max(1) as u64
}

/// Words whose total frequency across the corpus is at or below
/// [`singleton_threshold`]. Stop-words are counted like any other token.
pub fn find_excluded_words<C>(corpus: &C, tokenizer: &Tokenizer) -> Result<Vec<String>>
where
    C: Corpus + ?Sized,
{
    let mut counts: FxHashMap<String, u64> = FxHashMap::default();
    for doc in corpus.documents() {
        let doc = doc?;
        for token in tokenizer.tokens(doc.content()) {
            *counts.entry(token.text).or_insert(0) += 1;
        }
    }
    let threshold = singleton_threshold(corpus.len());
    let mut excluded: Vec<String> = counts.into_iter().filter(|(_, n)| *n <= threshold).map(|(w, _)| w).collect();
    excluded.sort_unstable();
    info!(threshold, excluded = excluded.len(), "found rare words to exclude");
    Ok(excluded)
}
