//! Domain types shared by the text, writer and reader stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dense 0-based position of a document in corpus iteration order.
pub type DocIndex = usize;
/// Dense id assigned to a surface form or abstraction in first-seen order.
pub type WordId = u32;
pub type TopicId = u32;
pub type Meta = HashMap<String, String>;

/// A source document. Immutable once read; the pipeline only borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    index: DocIndex,
    name: String,
    content: String,
    metadata: Meta,
}

impl Document {
    pub fn new(index: DocIndex, content: impl Into<String>) -> Self {
        Self { index, name: index.to_string(), content: content.into(), metadata: Meta::new() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self { self.name = name.into(); self }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn index(&self) -> DocIndex { self.index }
    pub fn name(&self) -> &str { &self.name }
    pub fn content(&self) -> &str { &self.content }
    pub fn metadata(&self) -> &Meta { &self.metadata }
}

/// One row of the persisted subdocument table. The row's position in the
/// table is the sequence number the engine reports for that subdocument.
///
/// - `offset_base`: character offset of the subdocument inside its document
/// - `token_count`: number of encoded tokens written for the subdocument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdocumentEntry {
    pub name: String,
    pub doc_index: DocIndex,
    pub offset_base: usize,
    pub token_count: usize,
}

/// A token mapped back onto its source document together with its topic(s).
///
/// `offset` is a character offset into the document content. `topics` holds a
/// single id for flat models and the leaf-to-root path for hierarchical ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTopicAssignment {
    pub doc_index: DocIndex,
    pub offset: usize,
    pub token: String,
    pub abstraction: String,
    pub topics: Vec<TopicId>,
}

impl TokenTopicAssignment {
    /// Most specific topic assigned to the token.
    pub fn leaf_topic(&self) -> Option<TopicId> { self.topics.first().copied() }
}

/// An assignment numbered by its position among its document's assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedAssignment {
    pub token_index: usize,
    #[serde(flatten)]
    pub assignment: TokenTopicAssignment,
}
