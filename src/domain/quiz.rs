use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::VocabularyItem;

/// How a single question is answered and graded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerMode {
  /// Give the parts of speech and meanings for a word
  A,
  /// Spell the word
  B,
}

impl AnswerMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::A => "A",
      Self::B => "B",
    }
  }
}

/// Mode requested for the whole quiz. `C` mixes A and B per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QuizMode {
  #[default]
  A,
  B,
  C,
}

impl QuizMode {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim() {
      "A" | "a" => Some(Self::A),
      "B" | "b" => Some(Self::B),
      "C" | "c" => Some(Self::C),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::A => "A",
      Self::B => "B",
      Self::C => "C",
    }
  }

  /// Human-readable label shown above the quiz
  pub fn display_name(&self) -> &'static str {
    match self {
      Self::A => "Meaning & part of speech",
      Self::B => "Spelling",
      Self::C => "Mixed",
    }
  }

  /// The fixed mode every question gets, or None when it's chosen per question
  pub fn fixed(&self) -> Option<AnswerMode> {
    match self {
      Self::A => Some(AnswerMode::A),
      Self::B => Some(AnswerMode::B),
      Self::C => None,
    }
  }
}

/// An assembled quiz, held in the ephemeral store while the learner answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSpec {
  items: Vec<VocabularyItem>,
  modes: Vec<AnswerMode>,
  requested_mode: QuizMode,
  started_at: DateTime<Utc>,
}

impl QuizSpec {
  /// Returns None unless there is exactly one mode per item and at least one item.
  pub fn new(
    items: Vec<VocabularyItem>,
    modes: Vec<AnswerMode>,
    requested_mode: QuizMode,
    started_at: DateTime<Utc>,
  ) -> Option<Self> {
    let spec = Self {
      items,
      modes,
      requested_mode,
      started_at,
    };
    spec.is_well_formed().then_some(spec)
  }

  /// Re-checked after decoding a stored blob
  pub fn is_well_formed(&self) -> bool {
    !self.items.is_empty() && self.items.len() == self.modes.len()
  }

  pub fn items(&self) -> &[VocabularyItem] {
    &self.items
  }

  pub fn modes(&self) -> &[AnswerMode] {
    &self.modes
  }

  pub fn requested_mode(&self) -> QuizMode {
    self.requested_mode
  }

  pub fn started_at(&self) -> DateTime<Utc> {
    self.started_at
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Questions paired with their modes, in presentation order
  pub fn questions(&self) -> impl Iterator<Item = (&VocabularyItem, AnswerMode)> {
    self.items.iter().zip(self.modes.iter().copied())
  }
}

/// One learner answer as submitted. Fields not relevant to the question's mode are ignored.
///
/// Decoding never fails: a field of the wrong shape is read as empty, so one
/// malformed answer only costs that question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct Submission {
  pub pos: Vec<String>,
  pub meaning: Vec<String>,
  pub word: String,
}

impl From<serde_json::Value> for Submission {
  fn from(value: serde_json::Value) -> Self {
    Self::from_value(&value)
  }
}

impl Submission {
  /// Read a submission from loosely-typed JSON. Non-string list entries are skipped.
  pub fn from_value(value: &serde_json::Value) -> Self {
    let strings = |key: &str| -> Vec<String> {
      value
        .get(key)
        .and_then(serde_json::Value::as_array)
        .map(|list| list.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
    };

    Self {
      pos: strings("pos"),
      meaning: strings("meaning"),
      word: value
        .get("word")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string(),
    }
  }

  pub fn meaning_and_pos(pos: &[&str], meaning: &[&str]) -> Self {
    Self {
      pos: pos.iter().map(|s| s.to_string()).collect(),
      meaning: meaning.iter().map(|s| s.to_string()).collect(),
      word: String::new(),
    }
  }

  pub fn spelling(word: &str) -> Self {
    Self {
      word: word.to_string(),
      ..Self::default()
    }
  }
}

/// What the learner actually answered, kept verbatim for the result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
  MeaningAndPos { pos: Vec<String>, meaning: Vec<String> },
  Spelling { word: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
  pub mode: AnswerMode,
  pub item: VocabularyItem,
  pub response: Response,
  pub correct: bool,
}

/// Graded quiz, stored once and only read afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
  pub answers: Vec<GradedAnswer>,
  pub correct_count: usize,
  pub elapsed_seconds: u64,
}

impl ResultSet {
  pub fn total(&self) -> usize {
    self.answers.len()
  }

  /// Percentage of correct answers (0 for an empty result)
  pub fn accuracy(&self) -> f64 {
    if self.answers.is_empty() {
      0.0
    } else {
      self.correct_count as f64 / self.answers.len() as f64 * 100.0
    }
  }
}
