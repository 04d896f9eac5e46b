#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{expand_path, resolve_with_base, Capabilities, Config, EngineConfig, ModelKind, PipelineConfig, SegmentationConfig};
pub use corpus::{documents_from_texts, DirectoryCorpus};
pub use error::{AlignmentDefect, EmptyCorpus, EngineFailure, Error, HierarchyViolation, PathContext, Result};
pub use traits::Corpus;
pub use types::{DocIndex, Document, IndexedAssignment, Meta, SubdocumentEntry, TokenTopicAssignment, TopicId, WordId};
