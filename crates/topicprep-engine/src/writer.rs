//! Encodes a corpus into the engine's input file plus the side files used to
//! map engine output back onto the documents.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use topicprep_core::{AlignmentDefect, Corpus, EmptyCorpus, PathContext, Result, SubdocumentEntry};
use topicprep_text::{split, Analyzer, CharIndex, SegmentStrategy, Vocabulary};

use crate::paths::RunPaths;

/// Partition label written after every subdocument name.
pub const PARTITION_LABEL: &str = "all";

/// Counts describing an encoded corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCorpus {
    pub documents: usize,
    pub subdocuments: usize,
    pub tokens: usize,
    pub surfaces: usize,
    pub abstractions: usize,
    pub empty: Option<EmptyCorpus>,
}

impl PreparedCorpus {
    fn from_tables(subdocuments: &[SubdocumentEntry], vocabulary: &Vocabulary) -> Self {
        let documents = subdocuments.last().map_or(0, |s| s.doc_index + 1);
        let tokens = subdocuments.iter().map(|s| s.token_count).sum();
        let empty = if documents == 0 {
            Some(EmptyCorpus::NoDocuments)
        } else if tokens == 0 {
            Some(EmptyCorpus::NoTokens)
        } else {
            None
        };
        Self {
            documents,
            subdocuments: subdocuments.len(),
            tokens,
            surfaces: vocabulary.surfaces().len(),
            abstractions: vocabulary.abstractions().len(),
            empty,
        }
    }

    /// Counts of a previously written corpus.
    pub fn load(paths: &RunPaths) -> Result<Self> {
        Ok(Self::from_tables(&load_subdocuments(paths)?, &load_vocabulary(paths)?))
    }

    /// Fail with the empty-corpus condition if nothing is left to model.
    pub fn require_tokens(&self) -> Result<()> {
        match self.empty {
            Some(kind) => Err(kind.into()),
            None => Ok(()),
        }
    }
}

pub struct CorpusWriter<'a> {
    paths: &'a RunPaths,
    strategy: &'a dyn SegmentStrategy,
    show_progress: bool,
}

impl<'a> CorpusWriter<'a> {
    pub fn new(paths: &'a RunPaths, strategy: &'a dyn SegmentStrategy) -> Self {
        Self { paths, strategy, show_progress: false }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Write every prepare artifact. Token order, vocabulary ids and
    /// subdocument sequence numbers all follow corpus iteration order.
    pub fn write<C>(&self, corpus: &C, analyzer: &Analyzer) -> Result<PreparedCorpus>
    where
        C: Corpus + ?Sized,
    {
        let paths = self.paths;
        let mut input = BufWriter::new(File::create(&paths.corpus_input).at(&paths.corpus_input)?);
        let mut offsets = BufWriter::new(File::create(&paths.token_offsets).at(&paths.token_offsets)?);
        let mut vocabulary = Vocabulary::new();
        let mut table: Vec<SubdocumentEntry> = Vec::new();
        let separator = analyzer.separator();

        let pb = self.progress_bar(corpus.len());
        for doc in corpus.documents() {
            let doc = doc?;
            let source = CharIndex::new(doc.content());
            for sub in split(self.strategy, doc.index(), doc.content()) {
                let tokens = analyzer.analyze(sub.content);
                let mut ids = Vec::with_capacity(tokens.len());
                let mut located = Vec::with_capacity(tokens.len());
                for (token_index, token) in tokens.iter().enumerate() {
                    let offset = sub.offset_base + token.offset;
                    if let Err(found) = token.check_source(&source, offset, separator) {
                        return Err(AlignmentDefect::OffsetMismatch {
                            doc_index: doc.index(),
                            subdocument: sub.name.clone(),
                            token_index,
                            offset,
                            token: token.text.clone(),
                            found,
                        }
                        .into());
                    }
                    let abstraction = analyzer.abstraction(&token.text);
                    let (_, abstraction_id) = vocabulary.encode(&token.text, &abstraction);
                    ids.push(abstraction_id.to_string());
                    located.push((token.text.as_str(), offset));
                }

                writeln!(input, "{} {} {}", sub.name, PARTITION_LABEL, ids.join(" ")).at(&paths.corpus_input)?;
                serde_json::to_writer(&mut offsets, &located).at(&paths.token_offsets)?;
                writeln!(offsets).at(&paths.token_offsets)?;
                table.push(SubdocumentEntry {
                    name: sub.name,
                    doc_index: doc.index(),
                    offset_base: sub.offset_base,
                    token_count: tokens.len(),
                });
            }
            pb.inc(1);
        }
        input.flush().at(&paths.corpus_input)?;
        offsets.flush().at(&paths.token_offsets)?;
        pb.finish_and_clear();

        write_json(&paths.subdocuments, &table)?;
        write_json(&paths.vocabulary, &vocabulary)?;
        write_json(&paths.excluded_words, &analyzer.excluded().sorted())?;
        let stopwords = analyzer.stopwords().sorted().join("\n");
        fs::write(&paths.stopwords, stopwords).at(&paths.stopwords)?;

        let prepared = PreparedCorpus::from_tables(&table, &vocabulary);
        info!(
            documents = prepared.documents,
            subdocuments = prepared.subdocuments,
            tokens = prepared.tokens,
            surfaces = prepared.surfaces,
            abstractions = prepared.abstractions,
            "corpus encoded"
        );
        Ok(prepared)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%)")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = BufWriter::new(File::create(path).at(path)?);
    serde_json::to_writer(file, value).at(path)
}

pub fn load_subdocuments(paths: &RunPaths) -> Result<Vec<SubdocumentEntry>> {
    let file = BufReader::new(File::open(&paths.subdocuments).at(&paths.subdocuments)?);
    serde_json::from_reader(file).at(&paths.subdocuments)
}

pub fn load_vocabulary(paths: &RunPaths) -> Result<Vocabulary> {
    let file = BufReader::new(File::open(&paths.vocabulary).at(&paths.vocabulary)?);
    serde_json::from_reader(file).at(&paths.vocabulary)
}

/// One parsed line of the token offset index.
pub fn parse_offsets_line(line: &str, path: &Path) -> Result<Vec<(String, usize)>> {
    serde_json::from_str(line.trim_end()).at(path)
}
