//! Reassembly of engine output into per-document token assignments.
//!
//! The reader walks the state file once, front to back, and advances a cursor
//! into the token offset index in lock-step: one offset line per subdocument,
//! never re-read. Assignments come out in the order the engine wrote them.

use std::io::{BufRead, Lines};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use topicprep_core::{
    AlignmentDefect, DocIndex, Error, IndexedAssignment, PathContext, Result, SubdocumentEntry, TokenTopicAssignment,
};
use topicprep_text::Vocabulary;

use crate::hierarchy::TopicHierarchy;
use crate::paths::RunPaths;
use crate::state::{StateLayout, StateReader, StateRecord};
use crate::writer::{load_subdocuments, load_vocabulary, parse_offsets_line};

/// The tables written by the prepare stage that reassembly needs.
#[derive(Debug, Clone)]
pub struct ReassemblyTables {
    pub subdocuments: Vec<SubdocumentEntry>,
    pub vocabulary: Arc<Vocabulary>,
}

impl ReassemblyTables {
    pub fn load(paths: &RunPaths) -> Result<Self> {
        Ok(Self { subdocuments: load_subdocuments(paths)?, vocabulary: Arc::new(load_vocabulary(paths)?) })
    }
}

struct Cursor {
    sequence: usize,
    tokens: Vec<(String, usize)>,
    next_position: usize,
}

pub struct AssignmentReader<S, O> {
    records: StateReader<S>,
    offsets: Lines<O>,
    offsets_path: PathBuf,
    offsets_line: usize,
    subdocuments: Vec<SubdocumentEntry>,
    vocabulary: Arc<Vocabulary>,
    hierarchy: Option<TopicHierarchy>,
    cursor: Option<Cursor>,
    next_unread: usize,
    done: bool,
}

impl<S: BufRead, O: BufRead> AssignmentReader<S, O> {
    pub fn new(records: StateReader<S>, offsets: O, offsets_path: &Path, tables: ReassemblyTables) -> Self {
        let hierarchy = (records.layout() == StateLayout::Hierarchical).then(TopicHierarchy::new);
        Self {
            records,
            offsets: offsets.lines(),
            offsets_path: offsets_path.to_path_buf(),
            offsets_line: 0,
            subdocuments: tables.subdocuments,
            vocabulary: tables.vocabulary,
            hierarchy,
            cursor: None,
            next_unread: 0,
            done: false,
        }
    }

    /// Edges seen so far; complete once the reader is exhausted.
    pub fn hierarchy(&self) -> Option<&TopicHierarchy> { self.hierarchy.as_ref() }

    pub fn into_hierarchy(self) -> Option<TopicHierarchy> { self.hierarchy }

    fn resolve(&mut self, record: StateRecord) -> Result<TokenTopicAssignment> {
        let sequence = record.sequence;
        if sequence >= self.subdocuments.len() {
            return Err(AlignmentDefect::UnknownSubdocument {
                line: record.line,
                sequence,
                name: record.name,
                known: self.subdocuments.len(),
            }
            .into());
        }
        match self.cursor.as_ref().map(|c| c.sequence) {
            Some(previous) if sequence < previous => {
                return Err(AlignmentDefect::OutOfOrderSubdocument {
                    line: record.line,
                    previous,
                    found: sequence,
                    name: record.name,
                }
                .into());
            }
            Some(previous) if sequence == previous => {}
            _ => self.advance_to(sequence, record.line)?,
        }

        let entry = &self.subdocuments[sequence];
        if record.name != entry.name {
            return Err(AlignmentDefect::SubdocumentNameMismatch {
                line: record.line,
                sequence,
                expected: entry.name.clone(),
                found: record.name,
            }
            .into());
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(AlignmentDefect::UnknownSubdocument { line: record.line, sequence, name: record.name, known: 0 }.into());
        };
        if cursor.next_position >= cursor.tokens.len() {
            return Err(AlignmentDefect::ExtraToken {
                line: record.line,
                name: record.name,
                position: record.position,
                token_count: cursor.tokens.len(),
            }
            .into());
        }
        if record.position != cursor.next_position {
            return Err(AlignmentDefect::TokenPositionMismatch {
                line: record.line,
                name: record.name,
                expected: cursor.next_position,
                found: record.position,
            }
            .into());
        }

        let vocabulary = &self.vocabulary;
        let abstraction = vocabulary.abstraction(record.word_id).ok_or(AlignmentDefect::UnknownVocabularyId {
            line: record.line,
            id: record.word_id,
            known: vocabulary.abstractions().len(),
        })?;
        let (surface, offset) = &cursor.tokens[record.position];
        let expected = vocabulary.abstraction_id_of(surface);
        if expected != Some(record.word_id) {
            return Err(AlignmentDefect::AbstractionMismatch {
                line: record.line,
                name: record.name,
                position: record.position,
                surface: surface.clone(),
                expected: expected.and_then(|id| vocabulary.abstraction(id)).unwrap_or("<unknown>").to_string(),
                found: abstraction.to_string(),
            }
            .into());
        }
        if let Some(hierarchy) = self.hierarchy.as_mut() {
            hierarchy.add_path(&record.topics)?;
        }
        cursor.next_position += 1;

        Ok(TokenTopicAssignment {
            doc_index: entry.doc_index,
            offset: *offset,
            token: surface.clone(),
            abstraction: abstraction.to_string(),
            topics: record.topics,
        })
    }

    /// Leave the current subdocument and load the offsets of `sequence`.
    /// Only subdocuments without tokens may be passed over.
    fn advance_to(&mut self, sequence: usize, line: usize) -> Result<()> {
        if let Some(c) = &self.cursor {
            if c.next_position < c.tokens.len() {
                return Err(AlignmentDefect::TruncatedSubdocument {
                    line,
                    sequence: c.sequence,
                    name: self.subdocuments[c.sequence].name.clone(),
                    consumed: c.next_position,
                    expected: c.tokens.len(),
                }
                .into());
            }
        }
        while self.next_unread < sequence {
            let skipped = self.next_unread;
            let entry = &self.subdocuments[skipped];
            if entry.token_count > 0 {
                return Err(AlignmentDefect::SkippedSubdocument {
                    line,
                    found: sequence,
                    skipped,
                    name: entry.name.clone(),
                    token_count: entry.token_count,
                }
                .into());
            }
            self.read_offsets(skipped)?;
        }
        let tokens = self.read_offsets(sequence)?;
        self.cursor = Some(Cursor { sequence, tokens, next_position: 0 });
        Ok(())
    }

    fn read_offsets(&mut self, sequence: usize) -> Result<Vec<(String, usize)>> {
        let text = match self.offsets.next() {
            Some(text) => text.at(&self.offsets_path)?,
            None => {
                return Err(Error::MalformedRecord {
                    path: self.offsets_path.clone(),
                    line: self.offsets_line + 1,
                    reason: format!("offset index ended before subdocument {sequence}"),
                })
            }
        };
        self.offsets_line += 1;
        let tokens = parse_offsets_line(&text, &self.offsets_path)?;
        let entry = &self.subdocuments[sequence];
        if tokens.len() != entry.token_count {
            return Err(AlignmentDefect::IndexLengthMismatch {
                name: entry.name.clone(),
                expected: entry.token_count,
                found: tokens.len(),
            }
            .into());
        }
        self.next_unread = sequence + 1;
        Ok(tokens)
    }

    /// End of the state file: every subdocument with tokens must have been
    /// read to its end.
    fn finish(&mut self) -> Result<()> {
        let line = self.records.line();
        if let Some(c) = &self.cursor {
            if c.next_position < c.tokens.len() {
                return Err(AlignmentDefect::TruncatedSubdocument {
                    line,
                    sequence: c.sequence,
                    name: self.subdocuments[c.sequence].name.clone(),
                    consumed: c.next_position,
                    expected: c.tokens.len(),
                }
                .into());
            }
        }
        if let Some((sequence, entry)) =
            self.subdocuments.iter().enumerate().skip(self.next_unread).find(|(_, e)| e.token_count > 0)
        {
            return Err(AlignmentDefect::TruncatedSubdocument {
                line,
                sequence,
                name: entry.name.clone(),
                consumed: 0,
                expected: entry.token_count,
            }
            .into());
        }
        Ok(())
    }
}

impl<S: BufRead, O: BufRead> Iterator for AssignmentReader<S, O> {
    type Item = Result<TokenTopicAssignment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = match self.records.next() {
            Some(Ok(record)) => self.resolve(record).map(Some),
            Some(Err(e)) => Err(e),
            None => self.finish().map(|()| None),
        };
        match step {
            Ok(Some(assignment)) => Some(Ok(assignment)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Numbers assignments by position within their document, restarting at
/// zero whenever the document changes.
pub struct TokenIndexed<I> {
    inner: I,
    doc: Option<DocIndex>,
    next: usize,
}

impl<I> Iterator for TokenIndexed<I>
where
    I: Iterator<Item = Result<TokenTopicAssignment>>,
{
    type Item = Result<IndexedAssignment>;

    fn next(&mut self) -> Option<Self::Item> {
        let assignment = match self.inner.next()? {
            Ok(a) => a,
            Err(e) => return Some(Err(e)),
        };
        if self.doc != Some(assignment.doc_index) {
            self.doc = Some(assignment.doc_index);
            self.next = 0;
        }
        let token_index = self.next;
        self.next += 1;
        Some(Ok(IndexedAssignment { token_index, assignment }))
    }
}

pub trait WithTokenIndex: Iterator<Item = Result<TokenTopicAssignment>> + Sized {
    fn with_token_index(self) -> TokenIndexed<Self> { TokenIndexed { inner: self, doc: None, next: 0 } }
}

impl<I> WithTokenIndex for I where I: Iterator<Item = Result<TokenTopicAssignment>> {}
