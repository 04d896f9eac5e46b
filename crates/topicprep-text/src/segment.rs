//! Splitting documents into named, contiguous subdocuments.
//!
//! A strategy only proposes cut points; [`split`] turns them into slices of
//! the document text, so the pieces always concatenate back to it
//! exactly and each `offset_base` is the character count of everything before
//! it.

use topicprep_core::{DocIndex, SegmentationConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subdocument<'a> {
    pub name: String,
    pub doc_index: DocIndex,
    /// Character offset of `content` within the document.
    pub offset_base: usize,
    pub content: &'a str,
}

pub trait SegmentStrategy: Send + Sync {
    /// Byte positions at which a new subdocument starts. Positions outside
    /// the text, off a char boundary or out of order are ignored.
    fn cut_points(&self, content: &str) -> Vec<usize>;

    fn subdocument_name(&self, doc_index: DocIndex, ordinal: usize) -> String;
}

/// One subdocument per document, named after the document index.
#[derive(Debug, Clone, Copy, Default)]
pub struct Whole;

impl SegmentStrategy for Whole {
    fn cut_points(&self, _content: &str) -> Vec<usize> { Vec::new() }
    fn subdocument_name(&self, doc_index: DocIndex, _ordinal: usize) -> String { doc_index.to_string() }
}

/// Cut at the first delimiter found at least `min_chars` characters into the
/// current piece. A tail shorter than `min_chars` stays with the last piece.
#[derive(Debug, Clone)]
pub struct Lines {
    pub delimiter: String,
    pub min_chars: usize,
}

impl SegmentStrategy for Lines {
    fn cut_points(&self, content: &str) -> Vec<usize> {
        let mut cuts = Vec::new();
        let mut start = 0;
        while start < content.len() {
            let Some(cut) = self.next_cut(&content[start..]) else { break };
            let tail = &content[start + cut..];
            if tail.chars().count() < self.min_chars {
                break;
            }
            start += cut;
            cuts.push(start);
        }
        cuts
    }

    fn subdocument_name(&self, doc_index: DocIndex, ordinal: usize) -> String { format!("{doc_index}_subdoc{ordinal}") }
}

impl Lines {
    fn next_cut(&self, piece: &str) -> Option<usize> {
        let mut chars_before = 0;
        let mut counted_to = 0;
        for (at, _) in piece.match_indices(self.delimiter.as_str()) {
            chars_before += piece[counted_to..at].chars().count();
            counted_to = at;
            if at > 0 && chars_before >= self.min_chars {
                return Some(at);
            }
        }
        None
    }
}

pub fn strategy_for(config: &SegmentationConfig) -> Box<dyn SegmentStrategy> {
    match config {
        SegmentationConfig::Whole => Box::new(Whole),
        SegmentationConfig::Lines { delimiter, min_chars } => {
            Box::new(Lines { delimiter: delimiter.clone(), min_chars: *min_chars })
        }
    }
}

/// Split `content` into subdocuments. Empty content yields one empty piece.
pub fn split<'a>(strategy: &dyn SegmentStrategy, doc_index: DocIndex, content: &'a str) -> Vec<Subdocument<'a>> {
    let mut bounds = vec![0];
    for cut in strategy.cut_points(content) {
        let last = bounds[bounds.len() - 1];
        if cut > last && cut < content.len() && content.is_char_boundary(cut) {
            bounds.push(cut);
        }
    }
    bounds.push(content.len());

    let mut offset_base = 0;
    bounds
        .windows(2)
        .enumerate()
        .map(|(ordinal, w)| {
            let piece = &content[w[0]..w[1]];
            let sub = Subdocument {
                name: strategy.subdocument_name(doc_index, ordinal),
                doc_index,
                offset_base,
                content: piece,
            };
            offset_base += piece.chars().count();
            sub
        })
        .collect()
}
