//! Randomized quiz assembly.
//!
//! Items from the selected banks are pooled, a uniform sample is drawn
//! without replacement, and the sample is shuffled again so presentation
//! order carries no trace of pool or draw order.

use chrono::{DateTime, Utc};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use std::collections::HashSet;

use crate::config;
use crate::db::banks::BankMap;
use crate::domain::{AnswerMode, QuizMode, QuizSpec, VocabularyItem};

/// Assembly errors. All of them are user-facing, not internal faults.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyError {
  NoBanksSelected,
  NoQuestionsAvailable,
  InvalidRatio(String),
}

impl std::fmt::Display for AssemblyError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      AssemblyError::NoBanksSelected => write!(f, "No banks selected"),
      AssemblyError::NoQuestionsAvailable => write!(f, "No questions available"),
      AssemblyError::InvalidRatio(raw) => write!(f, "Invalid question ratio: {}", raw),
    }
  }
}

impl AssemblyError {
  pub fn user_message(&self) -> &'static str {
    match self {
      AssemblyError::NoBanksSelected => "Please select at least one bank",
      AssemblyError::NoQuestionsAvailable => "No questions available",
      AssemblyError::InvalidRatio(_) => "Question ratio must be between 0 and 1",
    }
  }
}

impl std::error::Error for AssemblyError {}

/// How many questions to draw from the pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingPolicy {
  /// Fraction of the pool, in (0, 1]
  Ratio(f64),
  /// Explicit count; `None` when the requested count didn't parse (use the whole pool)
  Custom(Option<i64>),
}

impl Default for SizingPolicy {
  fn default() -> Self {
    Self::Ratio(0.75)
  }
}

impl SizingPolicy {
  /// Build a policy from request fields: `count_mode` is a ratio like `"0.75"`
  /// or `"custom"`, in which case `custom_count` is parsed as an integer.
  pub fn from_request(count_mode: &str, custom_count: &str) -> Result<Self, AssemblyError> {
    let count_mode = count_mode.trim();
    if count_mode == config::CUSTOM_COUNT_MODE {
      return Ok(Self::Custom(custom_count.trim().parse().ok()));
    }

    let ratio: f64 = count_mode
      .parse()
      .map_err(|_| AssemblyError::InvalidRatio(count_mode.to_string()))?;
    if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
      return Err(AssemblyError::InvalidRatio(count_mode.to_string()));
    }
    Ok(Self::Ratio(ratio))
  }

  /// Number of questions for a pool of `pool_size` items, always within `[1, pool_size]`
  /// (0 only for an empty pool).
  pub fn target_count(&self, pool_size: usize) -> usize {
    if pool_size == 0 {
      return 0;
    }
    let target = match *self {
      // Half-way cases round to even
      Self::Ratio(r) => (pool_size as f64 * r).round_ties_even() as i64,
      Self::Custom(Some(n)) => n,
      Self::Custom(None) => pool_size as i64,
    };
    target.clamp(1, pool_size as i64) as usize
  }
}

/// Concatenate the items of every named bank that exists, in selection order.
/// A name listed twice contributes its bank once.
pub fn collect_pool<'a, S: AsRef<str>>(banks: &'a BankMap, selected: &[S]) -> Vec<&'a VocabularyItem> {
  let mut seen = HashSet::new();
  selected
    .iter()
    .map(|name| name.as_ref())
    .filter(|name| seen.insert(*name))
    .filter_map(|name| banks.get(name))
    .flat_map(|bank| bank.items.iter())
    .collect()
}

/// Assemble a quiz from the selected banks.
pub fn assemble<S, R>(
  banks: &BankMap,
  selected: &[S],
  sizing: SizingPolicy,
  mode: QuizMode,
  rng: &mut R,
  now: DateTime<Utc>,
) -> Result<QuizSpec, AssemblyError>
where
  S: AsRef<str>,
  R: Rng + ?Sized,
{
  if selected.is_empty() {
    return Err(AssemblyError::NoBanksSelected);
  }

  let pool = collect_pool(banks, selected);
  if pool.is_empty() {
    return Err(AssemblyError::NoQuestionsAvailable);
  }

  let target = sizing.target_count(pool.len());
  let mut items: Vec<VocabularyItem> = index::sample(rng, pool.len(), target)
    .into_iter()
    .map(|i| pool[i].clone())
    .collect();
  items.shuffle(rng);

  let modes: Vec<AnswerMode> = match mode.fixed() {
    Some(fixed) => vec![fixed; items.len()],
    None => (0..items.len())
      .map(|_| if rng.random_bool(0.5) { AnswerMode::A } else { AnswerMode::B })
      .collect(),
  };

  tracing::debug!(
    "Assembled quiz: {} of {} pooled items, mode {}",
    items.len(),
    pool.len(),
    mode.as_str()
  );

  QuizSpec::new(items, modes, mode, now).ok_or(AssemblyError::NoQuestionsAvailable)
}
