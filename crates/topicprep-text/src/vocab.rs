//! Append-only vocabularies for surface forms and their abstractions.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use topicprep_core::WordId;

/// Bijection between words and dense ids in first-seen order.
///
/// Serializes as the plain word list; the list position is the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabIndex {
    words: Vec<String>,
    ids: FxHashMap<String, WordId>,
}

impl VocabIndex {
    pub fn new() -> Self { Self::default() }

    /// Id of `word`, assigning the next free id if it is new.
    pub fn id_for(&mut self, word: &str) -> WordId {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        let id = self.words.len() as WordId;
        self.words.push(word.to_string());
        self.ids.insert(word.to_string(), id);
        id
    }

    pub fn get(&self, word: &str) -> Option<WordId> { self.ids.get(word).copied() }

    pub fn word_for(&self, id: WordId) -> Option<&str> { self.words.get(id as usize).map(String::as_str) }

    pub fn len(&self) -> usize { self.words.len() }
    pub fn is_empty(&self) -> bool { self.words.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (WordId, &str)> + '_ {
        self.words.iter().enumerate().map(|(i, w)| (i as WordId, w.as_str()))
    }

    /// Rebuild from a persisted listing. Duplicate words are rejected.
    pub fn from_words(words: Vec<String>) -> Result<Self, String> {
        let mut ids = FxHashMap::default();
        for (i, w) in words.iter().enumerate() {
            if ids.insert(w.clone(), i as WordId).is_some() {
                return Err(format!("duplicate vocabulary entry {w:?} at position {i}"));
            }
        }
        Ok(Self { words, ids })
    }
}

impl Serialize for VocabIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { self.words.serialize(serializer) }
}

impl<'de> Deserialize<'de> for VocabIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let words = Vec::<String>::deserialize(deserializer)?;
        Self::from_words(words).map_err(serde::de::Error::custom)
    }
}

/// Surface vocabulary, abstraction vocabulary and the surface→abstraction
/// mapping. Several surfaces may share one abstraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVocabulary")]
pub struct Vocabulary {
    surfaces: VocabIndex,
    abstractions: VocabIndex,
    surface_abstraction: Vec<WordId>,
}

#[derive(Deserialize)]
struct RawVocabulary {
    surfaces: VocabIndex,
    abstractions: VocabIndex,
    surface_abstraction: Vec<WordId>,
}

impl TryFrom<RawVocabulary> for Vocabulary {
    type Error = String;

    fn try_from(raw: RawVocabulary) -> Result<Self, String> {
        if raw.surface_abstraction.len() != raw.surfaces.len() {
            return Err(format!(
                "{} surfaces but {} abstraction links",
                raw.surfaces.len(),
                raw.surface_abstraction.len()
            ));
        }
        if let Some(bad) = raw.surface_abstraction.iter().find(|&&a| a as usize >= raw.abstractions.len()) {
            return Err(format!("abstraction id {bad} out of range"));
        }
        Ok(Self { surfaces: raw.surfaces, abstractions: raw.abstractions, surface_abstraction: raw.surface_abstraction })
    }
}

impl Vocabulary {
    pub fn new() -> Self { Self::default() }

    /// Register a surface form with its abstraction and return
    /// `(surface_id, abstraction_id)`. A surface keeps the abstraction it was
    /// first registered with.
    pub fn encode(&mut self, surface: &str, abstraction: &str) -> (WordId, WordId) {
        if let Some(id) = self.surfaces.get(surface) {
            return (id, self.surface_abstraction[id as usize]);
        }
        let surface_id = self.surfaces.id_for(surface);
        let abstraction_id = self.abstractions.id_for(abstraction);
        self.surface_abstraction.push(abstraction_id);
        (surface_id, abstraction_id)
    }

    pub fn surface_id(&self, surface: &str) -> Option<WordId> { self.surfaces.get(surface) }

    /// Abstraction id recorded for a surface form.
    pub fn abstraction_id_of(&self, surface: &str) -> Option<WordId> {
        self.surfaces.get(surface).map(|id| self.surface_abstraction[id as usize])
    }

    pub fn surface(&self, id: WordId) -> Option<&str> { self.surfaces.word_for(id) }
    pub fn abstraction(&self, id: WordId) -> Option<&str> { self.abstractions.word_for(id) }

    pub fn surfaces(&self) -> &VocabIndex { &self.surfaces }
    pub fn abstractions(&self) -> &VocabIndex { &self.abstractions }

    pub fn is_empty(&self) -> bool { self.surfaces.is_empty() }
}
