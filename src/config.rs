//! Application configuration constants.
//!
//! This module centralizes configurable values for the quiz engine and the
//! loader that resolves them from `config.toml`, the environment, or defaults.

use chrono::Duration;
use serde::Deserialize;
use std::path::PathBuf;

// ==================== Quiz Configuration ====================

/// Default ratio of the pool used when the caller doesn't pick a size
pub const DEFAULT_COUNT_MODE: &str = "0.75";

/// Default custom question count
pub const DEFAULT_CUSTOM_COUNT: &str = "100";

/// Count mode value that selects a custom question count
pub const CUSTOM_COUNT_MODE: &str = "custom";

// ==================== Ephemeral Store Configuration ====================

/// How long an in-flight quiz or result is kept, in minutes (2 hours)
pub const DEFAULT_QUIZ_MAX_AGE_MINUTES: i64 = 120;

/// How long a SQLite call waits on a locked database before failing
pub const SQLITE_BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

// ==================== Config Loading ====================

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    storage: Option<StorageSection>,
    quiz: Option<QuizSection>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    data_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QuizSection {
    max_age_minutes: Option<i64>,
}

/// Resolved engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub quiz_max_age: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(crate::paths::DEFAULT_DATA_DIR),
            quiz_max_age: Duration::minutes(DEFAULT_QUIZ_MAX_AGE_MINUTES),
        }
    }
}

impl EngineConfig {
    pub fn banks_path(&self) -> PathBuf {
        crate::paths::banks_path(&self.data_dir)
    }

    pub fn ephemeral_db_path(&self) -> PathBuf {
        crate::paths::ephemeral_db_path(&self.data_dir)
    }
}

/// Load engine config with priority: config.toml > .env / environment > default
pub fn load_engine_config() -> EngineConfig {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let file = std::fs::read_to_string("config.toml")
        .ok()
        .and_then(|contents| match toml::from_str::<FileConfig>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring malformed config.toml: {}", e);
                None
            }
        })
        .unwrap_or_default();

    resolve(file, |key| std::env::var(key).ok())
}

fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> EngineConfig {
    let mut config = EngineConfig::default();

    if let Some(dir) = file.storage.and_then(|s| s.data_dir) {
        tracing::info!("Using data directory from config.toml: {}", dir);
        config.data_dir = PathBuf::from(dir);
    } else if let Some(dir) = env("DATA_DIR") {
        tracing::info!("Using data directory from DATA_DIR env: {}", dir);
        config.data_dir = PathBuf::from(dir);
    }

    let minutes = file
        .quiz
        .and_then(|q| q.max_age_minutes)
        .or_else(|| env("QUIZ_MAX_AGE_MINUTES").and_then(|v| v.trim().parse().ok()))
        .filter(|m| *m > 0);
    if let Some(minutes) = minutes {
        config.quiz_max_age = Duration::minutes(minutes);
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = resolve(FileConfig::default(), no_env);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.quiz_max_age, Duration::hours(2));
    }

    #[test]
    fn test_file_overrides_env() {
        let file: FileConfig = toml::from_str(
            r#"
            [storage]
            data_dir = "/srv/quiz"

            [quiz]
            max_age_minutes = 30
            "#,
        )
        .unwrap();
        let env = |key: &str| match key {
            "DATA_DIR" => Some("/tmp/other".to_string()),
            "QUIZ_MAX_AGE_MINUTES" => Some("5".to_string()),
            _ => None,
        };

        let config = resolve(file, env);
        assert_eq!(config.data_dir, PathBuf::from("/srv/quiz"));
        assert_eq!(config.quiz_max_age, Duration::minutes(30));
    }

    #[test]
    fn test_env_used_without_file() {
        let env = |key: &str| match key {
            "DATA_DIR" => Some("/tmp/quiz".to_string()),
            "QUIZ_MAX_AGE_MINUTES" => Some(" 45 ".to_string()),
            _ => None,
        };
        let config = resolve(FileConfig::default(), env);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/quiz"));
        assert_eq!(config.quiz_max_age, Duration::minutes(45));
    }

    #[test]
    fn test_invalid_max_age_ignored() {
        let env = |key: &str| match key {
            "QUIZ_MAX_AGE_MINUTES" => Some("soon".to_string()),
            _ => None,
        };
        assert_eq!(resolve(FileConfig::default(), env).quiz_max_age, Duration::hours(2));

        let env = |key: &str| match key {
            "QUIZ_MAX_AGE_MINUTES" => Some("-3".to_string()),
            _ => None,
        };
        assert_eq!(resolve(FileConfig::default(), env).quiz_max_age, Duration::hours(2));
    }

    #[test]
    fn test_engine_config_paths() {
        let config = EngineConfig::default();
        assert!(config.banks_path().ends_with("banks.json"));
        assert!(config.ephemeral_db_path().ends_with("ephemeral.db"));
    }
}
