//! Regex tokenizer producing lowercased tokens with character offsets.
//!
//! Lowercasing never changes a token's length in characters, so a token
//! always covers `offset..offset + char_len()` of its source text.

use std::ops::Range;

use regex::{Matches, Regex};

use topicprep_core::{Error, Result};

use crate::stopwords::StopWords;

/// A token found inside one piece of text.
///
/// `offset` counts characters from the start of the text that was tokenized;
/// `span` is the matching byte range in that same text. A compound token keeps
/// the offset of its first word and a span covering every constituent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub offset: usize,
    pub span: Range<usize>,
}

/// Lowercase `text` one character at a time. A character whose lowercase
/// form is longer than one character (`İ`) is kept as it is.
pub fn fold_case(text: &str) -> String {
    text.chars()
        .map(|c| {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(l), None) => l,
                _ => c,
            }
        })
        .collect()
}

/// Character offset to byte position lookup over one text.
pub struct CharIndex<'t> {
    text: &'t str,
    starts: Vec<usize>,
}

impl<'t> CharIndex<'t> {
    pub fn new(text: &'t str) -> Self {
        let starts = text.char_indices().map(|(b, _)| b).chain(std::iter::once(text.len())).collect();
        Self { text, starts }
    }

    /// The `len` characters starting at character `offset`, if in range.
    pub fn slice(&self, offset: usize, len: usize) -> Option<&'t str> {
        let start = *self.starts.get(offset)?;
        let end = *self.starts.get(offset.checked_add(len)?)?;
        self.text.get(start..end)
    }
}

impl Token {
    /// Check the token against `source` at character `offset`, the position
    /// it is recorded under. Spaces inside the source slice stand for
    /// `separator` in compound tokens. On mismatch the slice actually found
    /// is returned.
    pub fn check_source(&self, source: &CharIndex<'_>, offset: usize, separator: char) -> std::result::Result<(), String> {
        let found = source.slice(offset, self.char_len()).unwrap_or_default();
        let normalized: String = fold_case(found).chars().map(|c| if c == ' ' { separator } else { c }).collect();
        if normalized == self.text { Ok(()) } else { Err(found.to_string()) }
    }

    pub fn char_len(&self) -> usize { self.text.chars().count() }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
}

impl Tokenizer {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Regex { pattern: pattern.to_string(), reason: e.to_string() })?;
        Ok(Self { pattern })
    }

    /// Every match in `text`, left to right. Calling again restarts the scan.
    pub fn tokens<'t>(&'t self, text: &'t str) -> Tokens<'t> {
        Tokens { matches: self.pattern.find_iter(text), text, consumed_bytes: 0, consumed_chars: 0 }
    }

    /// Like [`Tokenizer::tokens`] with stop-words skipped.
    pub fn filtered<'t>(&'t self, text: &'t str, stopwords: &'t StopWords) -> impl Iterator<Item = Token> + 't {
        self.tokens(text).filter(move |t| !stopwords.contains(&t.text))
    }
}

pub struct Tokens<'t> {
    matches: Matches<'t, 't>,
    text: &'t str,
    consumed_bytes: usize,
    consumed_chars: usize,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let m = self.matches.next()?;
            if m.as_str().is_empty() {
                continue;
            }
            self.consumed_chars += self.text[self.consumed_bytes..m.start()].chars().count();
            let offset = self.consumed_chars;
            self.consumed_chars += m.as_str().chars().count();
            self.consumed_bytes = m.end();
            return Some(Token { text: fold_case(m.as_str()), offset, span: m.range() });
        }
    }
}
