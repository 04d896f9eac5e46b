//! Line parser for the engine's sampling-state output.
//!
//! Data lines carry, whitespace separated: subdocument sequence number,
//! subdocument name, token position, the engine's own type index, the
//! vocabulary id we wrote, then either one topic (flat models) or the topic
//! path written root-first (hierarchical models). Lines starting with `#` are
//! comments.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use topicprep_core::{Error, PathContext, Result, TopicId, WordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateLayout {
    Flat,
    Hierarchical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    /// 1-based line number in the state file.
    pub line: usize,
    pub sequence: usize,
    pub name: String,
    pub position: usize,
    pub type_index: u64,
    pub word_id: WordId,
    /// Leaf first.
    pub topics: Vec<TopicId>,
}

const FIXED_FIELDS: usize = 5;

/// Parse one line; `Ok(None)` for comments and blank lines.
pub fn parse_line(layout: StateLayout, line: usize, text: &str, path: &Path) -> Result<Option<StateRecord>> {
    if text.starts_with('#') || text.trim().is_empty() {
        return Ok(None);
    }
    let malformed = |reason: String| Error::MalformedRecord { path: path.to_path_buf(), line, reason };
    let fields: Vec<&str> = text.split_whitespace().collect();
    match layout {
        StateLayout::Flat if fields.len() != FIXED_FIELDS + 1 => {
            return Err(malformed(format!("expected 6 fields, found {}", fields.len())));
        }
        StateLayout::Hierarchical if fields.len() <= FIXED_FIELDS => {
            return Err(malformed(format!("expected at least 6 fields, found {}", fields.len())));
        }
        _ => {}
    }

    fn number<T: std::str::FromStr>(field: &str, what: &str) -> std::result::Result<T, String> {
        field.parse().map_err(|_| format!("{what} {field:?} is not a non-negative integer"))
    }
    let sequence = number(fields[0], "subdocument sequence").map_err(&malformed)?;
    let position = number(fields[2], "token position").map_err(&malformed)?;
    let type_index = number(fields[3], "type index").map_err(&malformed)?;
    let word_id = number(fields[4], "vocabulary id").map_err(&malformed)?;
    let mut topics = fields[FIXED_FIELDS..]
        .iter()
        .map(|f| number::<TopicId>(f, "topic"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(&malformed)?;
    topics.reverse();

    Ok(Some(StateRecord { line, sequence, name: fields[1].to_string(), position, type_index, word_id, topics }))
}

/// Streams [`StateRecord`]s from a state file, skipping comments.
pub struct StateReader<R> {
    lines: std::io::Lines<R>,
    layout: StateLayout,
    path: PathBuf,
    line: usize,
}

impl<R: BufRead> StateReader<R> {
    pub fn new(reader: R, layout: StateLayout, path: &Path) -> Self {
        Self { lines: reader.lines(), layout, path: path.to_path_buf(), line: 0 }
    }

    /// Number of lines consumed so far.
    pub fn line(&self) -> usize { self.line }

    pub fn layout(&self) -> StateLayout { self.layout }
}

impl<R: BufRead> Iterator for StateReader<R> {
    type Item = Result<StateRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e).at(&self.path)),
            };
            self.line += 1;
            match parse_line(self.layout, self.line, &text, &self.path) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
