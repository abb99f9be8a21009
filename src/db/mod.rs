pub mod banks;
pub mod ephemeral;
pub mod schema;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use banks::{parse_bank, read_bank_source, BankParseError, BankStore};
pub use ephemeral::{generate_record_id, is_valid_record_id, EphemeralStore, MemoryEphemeralStore, SqliteEphemeralStore};
pub use schema::run_migrations;

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
  /// Log the error at warn level and return None
  fn log_warn(self, context: &str) -> Option<T>;
  /// Log the error at warn level and return the default
  fn log_warn_default(self, context: &str) -> T
  where
    T: Default;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
  fn log_warn(self, context: &str) -> Option<T> {
    match self {
      Ok(v) => Some(v),
      Err(e) => {
        tracing::warn!("{}: {}", context, e);
        None
      }
    }
  }

  fn log_warn_default(self, context: &str) -> T
  where
    T: Default,
  {
    match self {
      Ok(v) => v,
      Err(e) => {
        tracing::warn!("{}: {}", context, e);
        T::default()
      }
    }
  }
}

/// Storage failures from either the bank file or the ephemeral record store
#[derive(Debug)]
pub enum StoreError {
  Sqlite(rusqlite::Error),
  Io(std::io::Error),
  Encoding(serde_json::Error),
  LockPoisoned,
  /// Every generated identifier collided with a live record
  IdExhausted,
}

impl std::fmt::Display for StoreError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      StoreError::Sqlite(e) => write!(f, "SQLite error: {}", e),
      StoreError::Io(e) => write!(f, "IO error: {}", e),
      StoreError::Encoding(e) => write!(f, "Encoding error: {}", e),
      StoreError::LockPoisoned => write!(f, "Store lock poisoned"),
      StoreError::IdExhausted => write!(f, "Could not allocate a unique record id"),
    }
  }
}

impl StoreError {
  /// Returns a user-facing error message without exposing paths or SQL.
  pub fn user_message(&self) -> &'static str {
    match self {
      StoreError::Sqlite(_) | StoreError::LockPoisoned | StoreError::IdExhausted => {
        "Quiz storage unavailable"
      }
      StoreError::Io(_) => "Failed to access quiz storage",
      StoreError::Encoding(_) => "Failed to encode quiz data",
    }
  }
}

impl std::error::Error for StoreError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      StoreError::Sqlite(e) => Some(e),
      StoreError::Io(e) => Some(e),
      StoreError::Encoding(e) => Some(e),
      StoreError::LockPoisoned | StoreError::IdExhausted => None,
    }
  }
}

impl From<rusqlite::Error> for StoreError {
  fn from(e: rusqlite::Error) -> Self {
    StoreError::Sqlite(e)
  }
}

impl From<std::io::Error> for StoreError {
  fn from(e: std::io::Error) -> Self {
    StoreError::Io(e)
  }
}

impl From<serde_json::Error> for StoreError {
  fn from(e: serde_json::Error) -> Self {
    StoreError::Encoding(e)
  }
}

/// Try to acquire a store lock, returning an error if poisoned
pub fn try_lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
  mutex.lock().map_err(|_: PoisonError<_>| {
    tracing::error!("Store mutex poisoned - a thread panicked while holding the lock");
    StoreError::LockPoisoned
  })
}
