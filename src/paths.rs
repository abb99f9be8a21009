//! Project path functions - single source of truth for all file paths.
//!
//! ## Environment Variables
//!
//! - `DATA_DIR`: Override the base data directory (default: "data"), see config.rs
//!
//! This allows running isolated instances side by side:
//! ```bash
//! DATA_DIR=data/test vocab-quiz list
//! ```

use std::path::{Path, PathBuf};

/// Base data directory when nothing else is configured
pub const DEFAULT_DATA_DIR: &str = "data";

/// Question bank document (all banks in one JSON file)
pub fn banks_path(data_dir: &Path) -> PathBuf {
    data_dir.join("banks.json")
}

/// SQLite database holding in-flight quizzes and results
pub fn ephemeral_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("ephemeral.db")
}

// ==================== Tests ====================
