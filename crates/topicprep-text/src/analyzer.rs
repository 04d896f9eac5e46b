//! The per-run text model: tokenizer, halt words, collocations, abstraction.

use std::borrow::Cow;
use std::path::Path;

use tracing::info;

use topicprep_core::{resolve_with_base, Corpus, PipelineConfig, Result};

use crate::bigram::{BigramFinder, BigramPolicy, Collocations};
use crate::stem::Abstractor;
use crate::stopwords::{find_excluded_words, StopWords};
use crate::tokenize::{Token, Tokenizer};

pub struct Analyzer {
    tokenizer: Tokenizer,
    stopwords: StopWords,
    excluded: StopWords,
    collocations: Option<Collocations>,
    abstractor: Abstractor,
    separator: char,
}

impl Analyzer {
    pub fn new(tokenizer: Tokenizer, stopwords: StopWords, abstractor: Abstractor, separator: char) -> Self {
        Self { tokenizer, stopwords, excluded: StopWords::new(), collocations: None, abstractor, separator }
    }

    /// Assemble the text model for a run. Training passes over `corpus`
    /// (rare-word counting, collocation training) happen here, before any
    /// document is encoded.
    pub fn build<C>(config: &PipelineConfig, base: &Path, corpus: &C) -> Result<Self>
    where
        C: Corpus + ?Sized,
    {
        let tokens = &config.tokens;
        let tokenizer = Tokenizer::new(&tokens.pattern)?;

        let mut stopwords = if tokens.use_default_stopwords { StopWords::english() } else { StopWords::new() };
        stopwords.extend(&tokens.stopwords);
        if let Some(file) = &tokens.stopwords_file {
            let loaded = StopWords::load(&resolve_with_base(base, file), &tokenizer)?;
            stopwords.extend(loaded.sorted());
        }

        let separator = config.bigrams.separator;
        let abstractor = Abstractor::new(config.stemming, separator);
        let mut analyzer = Self::new(tokenizer, stopwords, abstractor, separator);

        if tokens.remove_singletons {
            analyzer.excluded = StopWords::from_words(find_excluded_words(corpus, &analyzer.tokenizer)?);
        }
        if config.capabilities().needs_bigram_detection {
            let collocations = analyzer.train_collocations(BigramPolicy::from(&config.bigrams), corpus)?;
            analyzer.collocations = Some(collocations);
        }
        Ok(analyzer)
    }

    fn train_collocations<C>(&self, policy: BigramPolicy, corpus: &C) -> Result<Collocations>
    where
        C: Corpus + ?Sized,
    {
        let mut halt = self.stopwords.clone();
        halt.extend(self.excluded.sorted());
        let mut finder = BigramFinder::new(policy, halt);
        for doc in corpus.documents() {
            let doc = doc?;
            let tokens: Vec<Token> = self.tokenizer.tokens(doc.content()).collect();
            finder.train(doc.index(), &tokens);
        }
        let collocations = finder.finish();
        for c in collocations.report().iter().take(10) {
            info!(first = %c.first, second = %c.second, score = c.score, pair_count = c.pair_count, doc_count = c.doc_count, "top collocation");
        }
        Ok(collocations)
    }

    /// Tokens of `text` as they are encoded: collocations merged, then stop
    /// and excluded words dropped.
    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let raw: Vec<Token> = self.tokenizer.tokens(text).collect();
        let combined = match &self.collocations {
            Some(c) => c.combine(raw, text),
            None => raw,
        };
        combined.into_iter().filter(|t| !self.is_halt(&t.text)).collect()
    }

    pub fn is_halt(&self, word: &str) -> bool { self.stopwords.contains(word) || self.excluded.contains(word) }

    pub fn abstraction<'w>(&self, surface: &'w str) -> Cow<'w, str> { self.abstractor.abstraction(surface) }

    pub fn stopwords(&self) -> &StopWords { &self.stopwords }
    pub fn excluded(&self) -> &StopWords { &self.excluded }
    pub fn collocations(&self) -> Option<&Collocations> { self.collocations.as_ref() }
    pub fn separator(&self) -> char { self.separator }
}
