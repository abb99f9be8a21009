//! Expiring key -> blob storage for in-flight quizzes and graded results.
//!
//! Records are addressed by an opaque 128-bit identifier and carry their
//! creation time. Nothing expires on its own: callers run
//! [`EphemeralStore::sweep_expired`] opportunistically, and duplicate sweeps
//! are harmless because deletes are idempotent.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand_core::{OsRng, RngCore};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{run_migrations, try_lock, StoreError};
use crate::config;

/// Length of a record identifier in hex characters (16 bytes)
pub const RECORD_ID_LEN: usize = 32;

/// How many times `put` retries after an identifier collision before giving up
const MAX_ID_ATTEMPTS: usize = 4;

pub trait EphemeralStore: Send + Sync {
  /// Store a blob under a freshly generated identifier
  fn put(&self, blob: &str) -> Result<String, StoreError>;

  /// Fetch a blob; unknown or malformed identifiers are `Ok(None)`
  fn get(&self, id: &str) -> Result<Option<String>, StoreError>;

  /// Like `get`, but records created before `cutoff` read as absent. Never writes.
  fn get_created_since(&self, id: &str, cutoff: DateTime<Utc>) -> Result<Option<String>, StoreError>;

  /// Remove a record if present
  fn delete(&self, id: &str) -> Result<(), StoreError>;

  /// Fetch and remove a record in one step. Only one concurrent caller gets `Some`.
  fn take(&self, id: &str) -> Result<Option<String>, StoreError>;

  /// Remove every record created before `cutoff`, returning how many were removed
  fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

  /// Remove every record older than `max_age`
  fn sweep_expired(&self, max_age: Duration) -> Result<usize, StoreError> {
    self.sweep_older_than(Utc::now() - max_age)
  }

  /// Fetch a record no older than `max_age`, leaving expired ones for the next sweep
  fn get_unexpired(&self, id: &str, max_age: Duration) -> Result<Option<String>, StoreError> {
    self.get_created_since(id, Utc::now() - max_age)
  }
}

/// Generate a new record identifier.
///
/// 32 bytes of OS randomness plus the current time, hashed with SHA-256 and
/// cut to 16 bytes (32 hex chars). Nothing caller-supplied goes into it.
pub fn generate_record_id() -> String {
  let mut seed = [0u8; 32];
  OsRng.fill_bytes(&mut seed);

  let mut hasher = Sha256::new();
  hasher.update(seed);
  hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
  let hash = hasher.finalize();
  hex::encode(&hash[..RECORD_ID_LEN / 2])
}

/// True if `id` has the shape produced by [`generate_record_id`]
pub fn is_valid_record_id(id: &str) -> bool {
  id.len() == RECORD_ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Fixed-width timestamps so text comparison in SQL matches time order
fn format_timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ==================== SQLite store ====================

/// Durable store backed by a SQLite file.
///
/// Each operation opens its own connection, so calls for different
/// identifiers never queue behind a shared in-process lock. WAL mode lets
/// readers run alongside a writer; `busy_timeout` covers writer contention.
#[derive(Debug, Clone)]
pub struct SqliteEphemeralStore {
  path: PathBuf,
}

impl SqliteEphemeralStore {
  /// Open (creating if needed) the store at `path` and run migrations
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let store = Self {
      path: path.to_path_buf(),
    };
    let conn = store.connect()?;
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    tracing::debug!("Ephemeral store journal mode: {}", mode);
    run_migrations(&conn)?;

    tracing::debug!("Ephemeral store ready at {}", path.display());
    Ok(store)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn connect(&self) -> Result<Connection, StoreError> {
    let conn = Connection::open(&self.path)?;
    conn.busy_timeout(config::SQLITE_BUSY_TIMEOUT)?;
    Ok(conn)
  }

  /// Insert a blob with an explicit creation time
  pub fn put_at(&self, blob: &str, created_at: DateTime<Utc>) -> Result<String, StoreError> {
    let conn = self.connect()?;
    let created = format_timestamp(created_at);

    for _ in 0..MAX_ID_ATTEMPTS {
      let id = generate_record_id();
      let inserted = conn.execute(
        "INSERT OR IGNORE INTO ephemeral_records (id, blob, created_at) VALUES (?1, ?2, ?3)",
        params![id, blob, created],
      )?;
      if inserted == 1 {
        return Ok(id);
      }
      tracing::warn!("Ephemeral record id collision, regenerating");
    }

    Err(StoreError::IdExhausted)
  }
}

impl EphemeralStore for SqliteEphemeralStore {
  fn put(&self, blob: &str) -> Result<String, StoreError> {
    self.put_at(blob, Utc::now())
  }

  fn get(&self, id: &str) -> Result<Option<String>, StoreError> {
    if !is_valid_record_id(id) {
      return Ok(None);
    }
    let conn = self.connect()?;
    let blob = conn
      .query_row(
        "SELECT blob FROM ephemeral_records WHERE id = ?1",
        params![id],
        |row| row.get(0),
      )
      .optional()?;
    Ok(blob)
  }

  fn get_created_since(&self, id: &str, cutoff: DateTime<Utc>) -> Result<Option<String>, StoreError> {
    if !is_valid_record_id(id) {
      return Ok(None);
    }
    let conn = self.connect()?;
    let blob = conn
      .query_row(
        "SELECT blob FROM ephemeral_records WHERE id = ?1 AND created_at >= ?2",
        params![id, format_timestamp(cutoff)],
        |row| row.get(0),
      )
      .optional()?;
    Ok(blob)
  }

  fn delete(&self, id: &str) -> Result<(), StoreError> {
    if !is_valid_record_id(id) {
      return Ok(());
    }
    let conn = self.connect()?;
    conn.execute("DELETE FROM ephemeral_records WHERE id = ?1", params![id])?;
    Ok(())
  }

  fn take(&self, id: &str) -> Result<Option<String>, StoreError> {
    if !is_valid_record_id(id) {
      return Ok(None);
    }
    let conn = self.connect()?;
    let blob = conn
      .query_row(
        "DELETE FROM ephemeral_records WHERE id = ?1 RETURNING blob",
        params![id],
        |row| row.get(0),
      )
      .optional()?;
    Ok(blob)
  }

  fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
    let conn = self.connect()?;
    let count = conn.execute(
      "DELETE FROM ephemeral_records WHERE created_at < ?1",
      params![format_timestamp(cutoff)],
    )?;
    Ok(count)
  }
}

// ==================== In-memory store ====================

struct Record {
  blob: String,
  created_at: DateTime<Utc>,
}

/// Process-local store; state is lost on restart.
#[derive(Default)]
pub struct MemoryEphemeralStore {
  records: Mutex<HashMap<String, Record>>,
}

impl MemoryEphemeralStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a blob with an explicit creation time
  pub fn put_at(&self, blob: &str, created_at: DateTime<Utc>) -> Result<String, StoreError> {
    let mut records = try_lock(&self.records)?;
    let mut id = generate_record_id();
    while records.contains_key(&id) {
      id = generate_record_id();
    }
    records.insert(
      id.clone(),
      Record {
        blob: blob.to_string(),
        created_at,
      },
    );
    Ok(id)
  }

  pub fn len(&self) -> usize {
    self.records.lock().map(|r| r.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl EphemeralStore for MemoryEphemeralStore {
  fn put(&self, blob: &str) -> Result<String, StoreError> {
    self.put_at(blob, Utc::now())
  }

  fn get(&self, id: &str) -> Result<Option<String>, StoreError> {
    let records = try_lock(&self.records)?;
    Ok(records.get(id).map(|r| r.blob.clone()))
  }

  fn get_created_since(&self, id: &str, cutoff: DateTime<Utc>) -> Result<Option<String>, StoreError> {
    let records = try_lock(&self.records)?;
    Ok(records
      .get(id)
      .filter(|r| r.created_at >= cutoff)
      .map(|r| r.blob.clone()))
  }

  fn delete(&self, id: &str) -> Result<(), StoreError> {
    try_lock(&self.records)?.remove(id);
    Ok(())
  }

  fn take(&self, id: &str) -> Result<Option<String>, StoreError> {
    Ok(try_lock(&self.records)?.remove(id).map(|r| r.blob))
  }

  fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
    let mut records = try_lock(&self.records)?;
    let before = records.len();
    records.retain(|_, r| r.created_at >= cutoff);
    Ok(before - records.len())
  }
}
