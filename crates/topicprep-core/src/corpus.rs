//! Corpus sources: a directory of `.txt` files and an in-memory list.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, PathContext, Result};
use crate::traits::Corpus;
use crate::types::{DocIndex, Document};

/// Every `.txt` file below a root directory, in sorted path order.
///
/// Files are read lazily on each pass. Each document carries `path` and
/// `category` metadata; the category is the file's parent directory relative
/// to the root, or `misc` for files directly under it.
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl DirectoryCorpus {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Io {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "corpus directory not found"),
            });
        }
        let files = list_txt_files(root);
        info!(root = %root.display(), files = files.len(), "opened directory corpus");
        Ok(Self { root: root.to_path_buf(), files })
    }

    pub fn open_limited(root: &Path, limit: usize) -> Result<Self> { Ok(Self::open(root)?.limited(limit)) }

    /// Keep only the first `limit` files.
    pub fn limited(mut self, limit: usize) -> Self {
        if self.files.len() > limit {
            self.files.truncate(limit);
            info!(limit, "limited corpus to first files");
        }
        self
    }

    /// Drop files below `dir`, e.g. analysis output kept inside the dataset.
    pub fn exclude(mut self, dir: &Path) -> Self {
        let before = self.files.len();
        self.files.retain(|f| !f.starts_with(dir));
        if self.files.len() < before {
            debug!(dir = %dir.display(), dropped = before - self.files.len(), "excluded files from corpus");
        }
        self
    }

    pub fn files(&self) -> &[PathBuf] { &self.files }

    fn load(&self, index: DocIndex, path: &Path) -> Result<Document> {
        debug!(index, path = %path.display(), "reading document");
        let content = read_file_content(path)?;
        let name = path.file_stem().map_or_else(|| index.to_string(), |s| s.to_string_lossy().into_owned());
        Ok(Document::new(index, content)
            .with_name(name)
            .with_metadata("path", path.to_string_lossy())
            .with_metadata("category", category_for(path, &self.root)))
    }
}

impl Corpus for DirectoryCorpus {
    fn len(&self) -> usize { self.files.len() }

    fn documents(&self) -> Box<dyn Iterator<Item = Result<Document>> + '_> {
        Box::new(self.files.iter().enumerate().map(|(index, path)| self.load(index, path)))
    }
}

/// Build an in-memory corpus from raw texts, indexed in order.
pub fn documents_from_texts<I, S>(texts: I) -> Vec<Document>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    texts.into_iter().enumerate().map(|(index, text)| Document::new(index, text)).collect()
}

fn read_file_content(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path).at(path)?).into_owned()),
    }
}

fn category_for(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    match relative.parent().and_then(Path::to_str) {
        Some(parent) if !parent.is_empty() => parent.to_string(),
        _ => "misc".to_string(),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    txt_files.sort();
    txt_files
}
