use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Separator between tags in `pos` and fragments in `meaning`
pub const LIST_SEPARATOR: char = '&';

/// Persisted shape of a vocabulary item (`{word, pos, meaning}` triple)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemRecord {
  word: String,
  pos: String,
  meaning: String,
}

/// One vocabulary test item.
///
/// All three fields are stored trimmed. Deserialization goes through the same
/// constructor, so a hand-edited banks file can't smuggle in padded values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ItemRecord", into = "ItemRecord")]
pub struct VocabularyItem {
  word: String,
  parts_of_speech: String,
  meaning: String,
}

impl VocabularyItem {
  pub fn new(word: &str, parts_of_speech: &str, meaning: &str) -> Self {
    Self {
      word: word.trim().to_string(),
      parts_of_speech: parts_of_speech.trim().to_string(),
      meaning: meaning.trim().to_string(),
    }
  }

  /// Word as written in the bank (case preserved for display)
  pub fn word(&self) -> &str {
    &self.word
  }

  /// Raw `&`-delimited part-of-speech tags
  pub fn parts_of_speech(&self) -> &str {
    &self.parts_of_speech
  }

  /// Raw `&`-delimited meaning fragments
  pub fn meaning(&self) -> &str {
    &self.meaning
  }

  pub fn pos_set(&self) -> HashSet<String> {
    split_list(&self.parts_of_speech)
  }

  pub fn meaning_set(&self) -> HashSet<String> {
    split_list(&self.meaning)
  }

  /// Mode A check: both tag sets must match exactly (order and duplicates ignored).
  pub fn check_meaning_and_pos<S: AsRef<str>>(&self, pos: &[S], meaning: &[S]) -> bool {
    clean_set(pos) == self.pos_set() && clean_set(meaning) == self.meaning_set()
  }

  /// Mode B check: trimmed, case-folded spelling must equal the word.
  pub fn check_spelling(&self, word: &str) -> bool {
    !self.word.is_empty() && word.trim().to_lowercase() == self.word.to_lowercase()
  }
}

impl From<ItemRecord> for VocabularyItem {
  fn from(record: ItemRecord) -> Self {
    Self::new(&record.word, &record.pos, &record.meaning)
  }
}

impl From<VocabularyItem> for ItemRecord {
  fn from(item: VocabularyItem) -> Self {
    Self {
      word: item.word,
      pos: item.parts_of_speech,
      meaning: item.meaning,
    }
  }
}

/// Split a `&`-delimited list into its trimmed, non-empty pieces
pub fn split_list(raw: &str) -> HashSet<String> {
  raw
    .split(LIST_SEPARATOR)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .collect()
}

fn clean_set<S: AsRef<str>>(values: &[S]) -> HashSet<String> {
  values
    .iter()
    .map(|v| v.as_ref().trim())
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .collect()
}

/// A named, ordered collection of vocabulary items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
  pub name: String,
  pub items: Vec<VocabularyItem>,
}

impl QuestionBank {
  pub fn new(name: impl Into<String>, items: Vec<VocabularyItem>) -> Self {
    Self {
      name: name.into(),
      items,
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}
