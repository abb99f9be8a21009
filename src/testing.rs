//! Test utilities for storage setup.
//!
//! Provides a temporary data directory laid out the same way as production
//! (`banks.json` and `ephemeral.db` under one directory).

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test environment backed by a temporary directory.
///
/// Everything under it is removed when the value is dropped.
pub struct TestEnv {
    /// Temporary directory (kept alive for file persistence)
    pub temp: TempDir,
}

impl TestEnv {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            temp: TempDir::new()?,
        })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn banks_path(&self) -> PathBuf {
        crate::paths::banks_path(self.path())
    }

    pub fn ephemeral_db_path(&self) -> PathBuf {
        crate::paths::ephemeral_db_path(self.path())
    }
}
