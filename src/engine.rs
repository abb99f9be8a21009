//! Quiz engine: the operations the web/UI layer calls.
//!
//! The engine owns a [`BankStore`], an [`EphemeralStore`] and a seedable RNG.
//! Starting or submitting a quiz first sweeps expired ephemeral records, so
//! no background timer is needed. Reads only filter by age and never write.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::config::EngineConfig;
use crate::db::{
    parse_bank, read_bank_source, try_lock, BankParseError, BankStore, EphemeralStore, LogOnError,
    SqliteEphemeralStore, StoreError,
};
use crate::domain::{QuizMode, QuizSpec, ResultSet, Submission};
use crate::quiz::{self, AssemblyError, SizingPolicy};

/// Engine-level failures reported back to the caller
#[derive(Debug)]
pub enum QuizError {
    Assembly(AssemblyError),
    InvalidBank(BankParseError),
    BankNotFound(String),
    /// The quiz or result is gone (expired, swept, or already submitted)
    SessionExpired,
    Storage(StoreError),
}

impl std::fmt::Display for QuizError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizError::Assembly(e) => write!(f, "{}", e),
            QuizError::InvalidBank(e) => write!(f, "{}", e),
            QuizError::BankNotFound(name) => write!(f, "Bank not found: {}", name),
            QuizError::SessionExpired => write!(f, "Quiz session expired"),
            QuizError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl QuizError {
    /// Returns a user-facing error message without exposing internals.
    pub fn user_message(&self) -> &'static str {
        match self {
            QuizError::Assembly(e) => e.user_message(),
            QuizError::InvalidBank(e) => e.user_message(),
            QuizError::BankNotFound(_) => "Bank does not exist",
            QuizError::SessionExpired => "Quiz session expired, please start again",
            QuizError::Storage(e) => e.user_message(),
        }
    }
}

impl std::error::Error for QuizError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuizError::Assembly(e) => Some(e),
            QuizError::InvalidBank(e) => Some(e),
            QuizError::Storage(e) => Some(e),
            QuizError::BankNotFound(_) | QuizError::SessionExpired => None,
        }
    }
}

impl From<AssemblyError> for QuizError {
    fn from(e: AssemblyError) -> Self {
        QuizError::Assembly(e)
    }
}

impl From<BankParseError> for QuizError {
    fn from(e: BankParseError) -> Self {
        QuizError::InvalidBank(e)
    }
}

impl From<StoreError> for QuizError {
    fn from(e: StoreError) -> Self {
        QuizError::Storage(e)
    }
}

/// What an ephemeral blob holds. Tagged so a result id can't be graded as a quiz.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EphemeralRecord {
    Quiz(QuizSpec),
    Result(ResultSet),
}

impl EphemeralRecord {
    fn decode(blob: &str) -> Option<Self> {
        serde_json::from_str::<Self>(blob).log_warn("Discarding undecodable ephemeral record")
    }
}

pub struct QuizEngine<S: EphemeralStore> {
    banks: BankStore,
    ephemeral: S,
    rng: Mutex<StdRng>,
    max_age: Duration,
}

impl QuizEngine<SqliteEphemeralStore> {
    /// Open the durable stores under the configured data directory
    pub fn open(config: &EngineConfig) -> Result<Self, StoreError> {
        let ephemeral = SqliteEphemeralStore::open(&config.ephemeral_db_path())?;
        Ok(Self::new(BankStore::new(config.banks_path()), ephemeral, config.quiz_max_age))
    }
}

impl<S: EphemeralStore> QuizEngine<S> {
    pub fn new(banks: BankStore, ephemeral: S, max_age: Duration) -> Self {
        Self::with_rng(banks, ephemeral, max_age, StdRng::from_os_rng())
    }

    /// Build an engine with a specific RNG (seeded in tests)
    pub fn with_rng(banks: BankStore, ephemeral: S, max_age: Duration, rng: StdRng) -> Self {
        Self {
            banks,
            ephemeral,
            rng: Mutex::new(rng),
            max_age,
        }
    }

    pub fn bank_store(&self) -> &BankStore {
        &self.banks
    }

    pub fn ephemeral(&self) -> &S {
        &self.ephemeral
    }

    /// Remove expired quizzes and results. Failures are logged, not returned.
    pub fn sweep_expired(&self) -> usize {
        let removed = self
            .ephemeral
            .sweep_expired(self.max_age)
            .log_warn_default("Ephemeral sweep failed");
        if removed > 0 {
            tracing::info!("Swept {} expired quiz record(s)", removed);
        }
        removed
    }

    // ==================== Banks ====================

    /// Bank names with their item counts
    pub fn list_banks(&self) -> BTreeMap<String, usize> {
        self.banks
            .load_all()
            .into_iter()
            .map(|(name, bank)| (name, bank.len()))
            .collect()
    }

    /// Total questions offered by the selected banks (unknown names count as 0)
    pub fn pool_size<N: AsRef<str>>(&self, bank_names: &[N]) -> usize {
        let banks = self.banks.load_all();
        quiz::collect_pool(&banks, bank_names).len()
    }

    /// Parse and store a bank, replacing any bank with the same name.
    /// Returns the number of items imported.
    pub fn import_bank<L: AsRef<str>>(&self, name: &str, lines: &[L]) -> Result<usize, QuizError> {
        let bank = parse_bank(name, lines)?;
        let count = bank.len();
        let bank_name = bank.name.clone();

        let replaced = self
            .banks
            .modify(|banks| (true, banks.insert(bank.name.clone(), bank).is_some()))?;

        tracing::info!(
            "{} bank {} with {} item(s)",
            if replaced { "Replaced" } else { "Imported" },
            bank_name,
            count
        );
        Ok(count)
    }

    /// Import raw uploaded bytes (UTF-8, one item per line)
    pub fn import_bank_source(&self, name: &str, bytes: &[u8]) -> Result<usize, QuizError> {
        let lines = read_bank_source(bytes)?;
        self.import_bank(name, &lines)
    }

    pub fn remove_bank(&self, name: &str) -> Result<(), QuizError> {
        let removed = self.banks.modify(|banks| {
            let removed = banks.remove(name).is_some();
            (removed, removed)
        })?;

        if !removed {
            return Err(QuizError::BankNotFound(name.to_string()));
        }
        tracing::info!("Removed bank {}", name);
        Ok(())
    }

    // ==================== Quizzes ====================

    /// Assemble a quiz and store it; returns the quiz id.
    pub fn start_quiz<N: AsRef<str>>(
        &self,
        bank_names: &[N],
        sizing: SizingPolicy,
        mode: QuizMode,
    ) -> Result<String, QuizError> {
        self.sweep_expired();

        let banks = self.banks.load_all();
        let spec = {
            let mut rng = try_lock(&self.rng)?;
            quiz::assemble(&banks, bank_names, sizing, mode, &mut *rng, Utc::now())?
        };

        let question_count = spec.len();
        let blob = serde_json::to_string(&EphemeralRecord::Quiz(spec)).map_err(StoreError::from)?;
        let id = self.ephemeral.put(&blob)?;

        tracing::debug!("Started quiz with {} question(s)", question_count);
        Ok(id)
    }

    /// Fetch an in-flight quiz for display. Absent if unknown, expired, or not a quiz.
    pub fn fetch_quiz_for_display(&self, quiz_id: &str) -> Option<QuizSpec> {
        let blob = self
            .ephemeral
            .get_unexpired(quiz_id, self.max_age)
            .log_warn("Failed to read quiz")
            .flatten()?;
        match EphemeralRecord::decode(&blob)? {
            EphemeralRecord::Quiz(spec) if spec.is_well_formed() => Some(spec),
            _ => None,
        }
    }

    /// Grade a quiz, store the result and return its id.
    ///
    /// The quiz record is consumed, so a second submission of the same id
    /// gets [`QuizError::SessionExpired`].
    pub fn submit_quiz(&self, quiz_id: &str, answers: &[Submission]) -> Result<String, QuizError> {
        self.sweep_expired();

        // Peek first so a result id passed by mistake isn't consumed
        if self.fetch_quiz_record(quiz_id)?.is_none() {
            return Err(QuizError::SessionExpired);
        }

        let spec = match self.ephemeral.take(quiz_id)?.as_deref().and_then(EphemeralRecord::decode) {
            Some(EphemeralRecord::Quiz(spec)) if spec.is_well_formed() => spec,
            _ => return Err(QuizError::SessionExpired),
        };

        let result = quiz::grade(&spec, answers, Utc::now());
        tracing::debug!(
            "Graded quiz: {}/{} correct in {}s",
            result.correct_count,
            result.total(),
            result.elapsed_seconds
        );

        let blob = serde_json::to_string(&EphemeralRecord::Result(result)).map_err(StoreError::from)?;
        Ok(self.ephemeral.put(&blob)?)
    }

    fn fetch_quiz_record(&self, quiz_id: &str) -> Result<Option<QuizSpec>, StoreError> {
        let record = self
            .ephemeral
            .get_unexpired(quiz_id, self.max_age)?
            .as_deref()
            .and_then(EphemeralRecord::decode);
        Ok(match record {
            Some(EphemeralRecord::Quiz(spec)) => Some(spec),
            _ => None,
        })
    }

    /// Fetch a graded result. Absent if unknown, expired, or not a result.
    pub fn fetch_result(&self, result_id: &str) -> Option<ResultSet> {
        let blob = self
            .ephemeral
            .get_unexpired(result_id, self.max_age)
            .log_warn("Failed to read result")
            .flatten()?;
        match EphemeralRecord::decode(&blob)? {
            EphemeralRecord::Result(result) => Some(result),
            EphemeralRecord::Quiz(_) => None,
        }
    }
}
