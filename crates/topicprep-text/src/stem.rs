//! Word abstraction: the form a surface token is modelled under.

use std::borrow::Cow;

use rust_stemmers::{Algorithm, Stemmer};

/// Maps surface tokens to abstractions. Without stemming the abstraction is
/// the surface itself; compound tokens are stemmed part by part.
pub struct Abstractor {
    stemmer: Option<Stemmer>,
    separator: char,
}

impl Abstractor {
    pub fn new(stemming: bool, separator: char) -> Self {
        let stemmer = if stemming { Some(Stemmer::create(Algorithm::English)) } else { None };
        Self { stemmer, separator }
    }

    pub fn abstraction<'w>(&self, surface: &'w str) -> Cow<'w, str> {
        let Some(stemmer) = &self.stemmer else { return Cow::Borrowed(surface) };
        if !surface.contains(self.separator) {
            return stemmer.stem(surface);
        }
        let mut joined = String::with_capacity(surface.len());
        for (i, part) in surface.split(self.separator).enumerate() {
            if i > 0 {
                joined.push(self.separator);
            }
            joined.push_str(&stemmer.stem(part));
        }
        Cow::Owned(joined)
    }
}
