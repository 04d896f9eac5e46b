#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Text side of the pipeline: tokens, subdocuments, collocations and vocabularies.

pub mod analyzer;
pub mod bigram;
pub mod segment;
pub mod stem;
pub mod stopwords;
pub mod tokenize;
pub mod vocab;

pub use analyzer::Analyzer;
pub use bigram::{log_likelihood, BigramFinder, BigramPolicy, Candidate, Collocations};
pub use segment::{split, strategy_for, Lines, SegmentStrategy, Subdocument, Whole};
pub use stem::Abstractor;
pub use stopwords::StopWords;
pub use tokenize::{fold_case, CharIndex, Token, Tokenizer};
pub use vocab::{VocabIndex, Vocabulary};
