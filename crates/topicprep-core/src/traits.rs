use crate::error::Result;
use crate::types::Document;

/// A re-iterable, ordered collection of documents.
///
/// Document indices must be dense and follow iteration order. The pipeline
/// walks the corpus more than once (stop-word counting, collocation training,
/// encoding), so every call to `documents` starts again from the first one.
pub trait Corpus {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn documents(&self) -> Box<dyn Iterator<Item = Result<Document>> + '_>;
}

impl Corpus for [Document] {
    fn len(&self) -> usize { <[Document]>::len(self) }
    fn documents(&self) -> Box<dyn Iterator<Item = Result<Document>> + '_> { Box::new(self.iter().cloned().map(Ok)) }
}

impl Corpus for Vec<Document> {
    fn len(&self) -> usize { self.as_slice().len() }
    fn documents(&self) -> Box<dyn Iterator<Item = Result<Document>> + '_> { self.as_slice().documents() }
}
