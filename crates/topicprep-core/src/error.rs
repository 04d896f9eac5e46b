//! Error taxonomy shared by every pipeline stage.
//!
//! Alignment defects and hierarchy violations are pipeline bugs: they are
//! never retried and always carry the coordinates of the offending record.
//! Engine failures are recoverable only by a fresh run after cleanup. An empty
//! corpus is a configuration mistake, reported under its own name.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DocIndex, TopicId, WordId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("alignment defect: {0}")]
    Alignment(#[from] AlignmentDefect),

    #[error("hierarchy violation: {0}")]
    Hierarchy(#[from] HierarchyViolation),

    #[error("engine failure: {0}")]
    Engine(#[from] EngineFailure),

    #[error("empty corpus: {0}")]
    EmptyCorpus(#[from] EmptyCorpus),

    #[error("malformed engine record at {}:{line}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, line: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid token pattern {pattern:?}: {reason}")]
    Regex { pattern: String, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attach the file a failed I/O or JSON operation was working on.
pub trait PathContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> PathContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Io { path: path.to_path_buf(), source })
    }
}

impl<T> PathContext<T> for serde_json::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Json { path: path.to_path_buf(), source })
    }
}

/// A violated alignment invariant between document text, subdocument token
/// sequences and the engine's id space.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlignmentDefect {
    #[error("token {token:?} (document {doc_index}, subdocument {subdocument}, token {token_index}) does not match the text {found:?} at offset {offset}")]
    OffsetMismatch {
        doc_index: DocIndex,
        subdocument: String,
        token_index: usize,
        offset: usize,
        token: String,
        found: String,
    },

    #[error("line {line}: subdocument sequence went backwards from {previous} to {found} ({name})")]
    OutOfOrderSubdocument { line: usize, previous: usize, found: usize, name: String },

    #[error("line {line}: jumped to subdocument {found}, skipping subdocument {skipped} ({name}) which holds {token_count} tokens")]
    SkippedSubdocument { line: usize, found: usize, skipped: usize, name: String, token_count: usize },

    #[error("line {line}: subdocument {sequence} ({name}) ended after {consumed} of {expected} tokens")]
    TruncatedSubdocument {
        line: usize,
        sequence: usize,
        name: String,
        consumed: usize,
        expected: usize,
    },

    #[error("line {line}: subdocument {sequence} is {expected:?} in the index but {found:?} in the engine output")]
    SubdocumentNameMismatch { line: usize, sequence: usize, expected: String, found: String },

    #[error("line {line}: subdocument sequence {sequence} ({name}) is beyond the {known} indexed subdocuments")]
    UnknownSubdocument { line: usize, sequence: usize, name: String, known: usize },

    #[error("line {line}: expected token position {expected} in subdocument {name}, found {found}")]
    TokenPositionMismatch { line: usize, name: String, expected: usize, found: usize },

    #[error("line {line}: subdocument {name} holds {token_count} tokens but the engine reports position {position}")]
    ExtraToken { line: usize, name: String, position: usize, token_count: usize },

    #[error("line {line}: vocabulary id {id} is outside the {known} known abstractions")]
    UnknownVocabularyId { line: usize, id: WordId, known: usize },

    #[error("line {line}: token {surface:?} at position {position} of subdocument {name} was encoded as {expected:?} but the engine reports {found:?}")]
    AbstractionMismatch {
        line: usize,
        name: String,
        position: usize,
        surface: String,
        expected: String,
        found: String,
    },

    #[error("subdocument {name}: offset index holds {found} tokens, subdocument table says {expected}")]
    IndexLengthMismatch { name: String, expected: usize, found: usize },
}

/// A topic path that would make the accumulated hierarchy cyclic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HierarchyViolation {
    #[error("edge {parent} -> {child} reverses the existing edge {child} -> {parent} (path {path:?})")]
    ReverseEdge { parent: TopicId, child: TopicId, path: Vec<TopicId> },

    #[error("topic {topic} is its own parent (path {path:?})")]
    SelfEdge { topic: TopicId, path: Vec<TopicId> },

    #[error("edge {parent} -> {child} closes a cycle: {child} is already an ancestor of {parent} (path {path:?})")]
    Cycle { parent: TopicId, child: TopicId, path: Vec<TopicId> },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineFailure {
    #[error("{program} could not be started for {stage}: {reason}")]
    Spawn { program: String, stage: String, reason: String },

    #[error("{program} {stage} exited with {status}; stderr tail:\n{stderr_tail}")]
    NonZeroExit { program: String, stage: String, status: String, stderr_tail: String },

    #[error("{program} {stage} exceeded its {seconds}s deadline")]
    Timeout { program: String, stage: String, seconds: u64 },

    #[error("{stage} finished but expected output {} is missing", path.display())]
    MissingOutput { stage: String, path: PathBuf },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyCorpus {
    #[error("the corpus contains no documents")]
    NoDocuments,

    #[error("no tokens survived tokenization and filtering")]
    NoTokens,
}
