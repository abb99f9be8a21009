//! Durable question bank storage.
//!
//! All banks live in one JSON document (`banks.json`) mapping bank name to an
//! ordered list of `{word, pos, meaning}` records. The whole document is
//! replaced on every save via a temp file renamed over the original, so an
//! interrupted write leaves the previous banks intact.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use super::{try_lock, StoreError};
use crate::domain::{QuestionBank, VocabularyItem};

/// Field separator inside one bank source line
const FIELD_SEPARATOR: char = '\t';

/// Bank source parsing errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankParseError {
    EmptyName,
    InvalidEncoding,
    NoItems(String),
}

impl std::fmt::Display for BankParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankParseError::EmptyName => write!(f, "Bank name is empty"),
            BankParseError::InvalidEncoding => write!(f, "Bank source is not valid UTF-8"),
            BankParseError::NoItems(name) => write!(f, "Bank {} has no valid lines", name),
        }
    }
}

impl BankParseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            BankParseError::EmptyName => "Please choose a name for the bank",
            BankParseError::InvalidEncoding => "Bank file must be UTF-8 text",
            BankParseError::NoItems(_) => "Bank file format is invalid",
        }
    }
}

impl std::error::Error for BankParseError {}

/// Split raw uploaded bytes into lines
pub fn read_bank_source(bytes: &[u8]) -> Result<Vec<String>, BankParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| BankParseError::InvalidEncoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Ok(text.lines().map(str::to_string).collect())
}

/// Parse tab-separated `word<TAB>pos<TAB>meaning` lines into a bank.
///
/// Blank lines and lines with fewer than three fields are skipped; fields past
/// the third are ignored. A bank with no usable lines is an error.
pub fn parse_bank<S: AsRef<str>>(name: &str, lines: &[S]) -> Result<QuestionBank, BankParseError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BankParseError::EmptyName);
    }

    let items: Vec<VocabularyItem> = lines
        .iter()
        .filter_map(|line| {
            let line = line.as_ref().trim();
            if line.is_empty() {
                return None;
            }
            let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
            if fields.len() < 3 {
                tracing::debug!("Skipping bank line with {} field(s)", fields.len());
                return None;
            }
            Some(VocabularyItem::new(fields[0], fields[1], fields[2]))
        })
        .collect();

    if items.is_empty() {
        return Err(BankParseError::NoItems(name.to_string()));
    }

    Ok(QuestionBank::new(name, items))
}

/// Derive a bank name from an uploaded file name (its stem)
pub fn bank_name_from_file_name(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Bank mapping keyed by name (sorted for stable listings)
pub type BankMap = BTreeMap<String, QuestionBank>;

pub struct BankStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl BankStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every bank. Missing or unreadable storage yields an empty map.
    pub fn load_all(&self) -> BankMap {
        match self.try_load_all() {
            Ok(banks) => banks,
            Err(e) => {
                tracing::warn!("Bank storage unreadable, treating as empty: {}", e);
                BankMap::new()
            }
        }
    }

    fn try_load_all(&self) -> Result<BankMap, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No bank file at {}", self.path.display());
                return Ok(BankMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        let raw: BTreeMap<String, Vec<VocabularyItem>> = serde_json::from_str(&contents)?;
        Ok(raw
            .into_iter()
            .filter(|(name, items)| {
                if items.is_empty() {
                    tracing::warn!("Dropping empty bank {} from storage", name);
                }
                !items.is_empty()
            })
            .map(|(name, items)| (name.clone(), QuestionBank::new(name, items)))
            .collect())
    }

    /// Replace the stored mapping. Returns false (and logs) on failure.
    pub fn save_all(&self, banks: &BankMap) -> bool {
        match self.try_save_all(banks) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save banks: {}", e);
                false
            }
        }
    }

    fn try_save_all(&self, banks: &BankMap) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let data: BTreeMap<&str, &[VocabularyItem]> = banks
            .iter()
            .filter(|(_, bank)| !bank.is_empty())
            .map(|(name, bank)| (name.as_str(), bank.items.as_slice()))
            .collect();

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &data)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// Load, apply `f`, and save if `f` reports a change, all under the writer lock.
    ///
    /// `f` returns `(changed, value)`. Unlike [`BankStore::load_all`], unreadable
    /// storage is an error here: nothing is written over a file we failed to parse.
    pub fn modify<T>(&self, f: impl FnOnce(&mut BankMap) -> (bool, T)) -> Result<T, StoreError> {
        let _guard = try_lock(&self.write_lock)?;
        let mut banks = self.try_load_all().map_err(|e| {
            tracing::error!("Refusing to modify unreadable bank storage: {}", e);
            e
        })?;
        let (changed, value) = f(&mut banks);
        if changed {
            self.try_save_all(&banks)?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    fn sample_lines() -> Vec<&'static str> {
        vec!["cat\tnoun\tfeline&animal", "run\tverb\tmove fast"]
    }

    #[test]
    fn test_parse_bank_basic() {
        let bank = parse_bank("animals", &sample_lines()).unwrap();
        assert_eq!(bank.name, "animals");
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.items[0].word(), "cat");
        assert_eq!(bank.items[0].meaning(), "feline&animal");
        assert_eq!(bank.items[1].parts_of_speech(), "verb");
    }

    #[test]
    fn test_parse_bank_skips_short_and_blank_lines() {
        let lines = vec!["", "   ", "only\ttwo", "cat\tnoun\tfeline", "no tabs at all"];
        let bank = parse_bank("b", &lines).unwrap();
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.items[0].word(), "cat");
    }

    #[test]
    fn test_parse_bank_ignores_extra_fields() {
        let bank = parse_bank("b", &["cat\tnoun\tfeline\textra\tmore"]).unwrap();
        assert_eq!(bank.items[0].meaning(), "feline");
    }

    #[test]
    fn test_parse_bank_trims_fields() {
        let bank = parse_bank("b", &["  cat \t noun \t feline & animal  "]).unwrap();
        assert_eq!(bank.items[0].word(), "cat");
        assert_eq!(bank.items[0].parts_of_speech(), "noun");
        assert_eq!(bank.items[0].meaning(), "feline & animal");
    }

    #[test]
    fn test_parse_bank_no_items_is_error() {
        let err = parse_bank("empty", &["", "one\ttwo"]).unwrap_err();
        assert_eq!(err, BankParseError::NoItems("empty".into()));
    }

    #[test]
    fn test_parse_bank_empty_name_is_error() {
        assert_eq!(parse_bank("  ", &sample_lines()).unwrap_err(), BankParseError::EmptyName);
    }

    #[test]
    fn test_read_bank_source_lines() {
        let lines = read_bank_source("\u{feff}a\tb\tc\r\nd\te\tf\n".as_bytes()).unwrap();
        assert_eq!(lines, vec!["a\tb\tc", "d\te\tf"]);
    }

    #[test]
    fn test_read_bank_source_rejects_invalid_utf8() {
        assert_eq!(read_bank_source(&[0xff, 0xfe, 0x00]).unwrap_err(), BankParseError::InvalidEncoding);
    }

    #[test]
    fn test_bank_name_from_file_name() {
        assert_eq!(bank_name_from_file_name("unit1.txt").as_deref(), Some("unit1"));
        assert_eq!(bank_name_from_file_name("dir/unit2.tsv").as_deref(), Some("unit2"));
        assert_eq!(bank_name_from_file_name(""), None);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let env = TestEnv::new().unwrap();
        let store = BankStore::new(env.path().join("banks.json"));
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let env = TestEnv::new().unwrap();
        let path = env.path().join("banks.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(BankStore::new(&path).load_all().is_empty());

        std::fs::write(&path, r#"{"b": [{"word": "x"}]}"#).unwrap();
        assert!(BankStore::new(&path).load_all().is_empty());
    }

    #[test]
    fn test_parse_save_load_roundtrip() {
        let env = TestEnv::new().unwrap();
        let store = BankStore::new(env.path().join("data").join("banks.json"));

        let bank = parse_bank("animals", &sample_lines()).unwrap();
        let mut banks = BankMap::new();
        banks.insert(bank.name.clone(), bank.clone());
        assert!(store.save_all(&banks));

        let loaded = store.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["animals"], bank);
    }

    #[test]
    fn test_save_uses_pos_key() {
        let env = TestEnv::new().unwrap();
        let store = BankStore::new(env.path().join("banks.json"));
        let mut banks = BankMap::new();
        banks.insert("b".into(), parse_bank("b", &["cat\tnoun\tfeline"]).unwrap());
        assert!(store.save_all(&banks));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["b"][0]["pos"], "noun");
    }

    #[test]
    fn test_load_drops_empty_banks() {
        let env = TestEnv::new().unwrap();
        let path = env.path().join("banks.json");
        std::fs::write(&path, r#"{"empty": [], "full": [{"word":"a","pos":"n","meaning":"m"}]}"#).unwrap();

        let banks = BankStore::new(&path).load_all();
        assert_eq!(banks.keys().collect::<Vec<_>>(), vec!["full"]);
    }

    #[test]
    fn test_save_failure_returns_false() {
        let env = TestEnv::new().unwrap();
        // Parent "directory" is a regular file
        let blocker = env.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = BankStore::new(blocker.join("banks.json"));
        assert!(!store.save_all(&BankMap::new()));
    }

    #[test]
    fn test_modify_only_saves_on_change() {
        let env = TestEnv::new().unwrap();
        let store = BankStore::new(env.path().join("banks.json"));

        let value = store.modify(|_| (false, 7)).unwrap();
        assert_eq!(value, 7);
        assert!(!store.path().exists());

        store
            .modify(|banks| {
                let bank = parse_bank("b", &["a\tn\tm"]).unwrap();
                banks.insert(bank.name.clone(), bank);
                (true, ())
            })
            .unwrap();
        assert_eq!(store.load_all().len(), 1);
    }

    #[test]
    fn test_modify_leaves_corrupt_file_untouched() {
        let env = TestEnv::new().unwrap();
        let path = env.path().join("banks.json");
        let original = r#"{"good": [{"word":"cat","pos":"noun","meaning":"feline"}], "bad": [{"word": 3}]}"#;
        std::fs::write(&path, original).unwrap();
        let store = BankStore::new(&path);

        let result = store.modify(|banks| {
            let bank = parse_bank("new", &["run\tverb\tmove"]).unwrap();
            banks.insert(bank.name.clone(), bank);
            (true, ())
        });

        assert!(matches!(result, Err(StoreError::Encoding(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        // Readers still degrade to empty
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_concurrent_modify_keeps_every_bank() {
        let env = TestEnv::new().unwrap();
        let store = BankStore::new(env.path().join("banks.json"));

        std::thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                s.spawn(move || {
                    store
                        .modify(|banks| {
                            let bank = parse_bank(&format!("bank-{}", i), &["a\tn\tm"]).unwrap();
                            banks.insert(bank.name.clone(), bank);
                            (true, ())
                        })
                        .unwrap();
                });
            }
        });

        let banks = store.load_all();
        assert_eq!(banks.len(), 8);
        for i in 0..8 {
            assert!(banks.contains_key(&format!("bank-{}", i)));
        }
    }
}
