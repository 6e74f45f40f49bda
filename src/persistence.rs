//! Persistence boundary
//!
//! The engine talks to storage through the [`StorePort`] trait: one
//! load at startup, one save after every state change. The file-backed
//! implementation keeps the three logical documents (roster, config,
//! history) as separate pretty-printed JSON files. A document that
//! fails to parse degrades to its default with a warning; storage
//! errors are never fatal to the caller's in-memory state.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::DrawConfig;
use crate::constants::storage;
use crate::history::{self, HistoryRecord};
use crate::roster::Participant;

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub participants: Vec<Participant>,
    pub config: DrawConfig,
    /// Most recent first
    pub history: Vec<HistoryRecord>,
}

/// Load/save contract the engine requires from its environment.
pub trait StorePort {
    /// Called once at startup. `Ok(None)` means a first run.
    fn load(&self) -> Result<Option<PersistedState>>;

    /// Called after every state change relevant to persisted fields.
    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON-file store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted at an explicit directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the platform data dir.
    pub fn default_location() -> Self {
        let mut dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.push(storage::APP_DIR);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn participants_path(&self) -> PathBuf {
        self.dir.join(storage::PARTICIPANTS_FILE)
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(storage::CONFIG_FILE)
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join(storage::HISTORY_FILE)
    }

    fn write_document(&self, path: &Path, json: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory {:?}", self.dir))?;
        fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}

impl StorePort for FileStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        let participants_path = self.participants_path();
        let config_path = self.config_path();
        let history_path = self.history_path();

        if !participants_path.exists() && !config_path.exists() && !history_path.exists() {
            return Ok(None);
        }

        let mut state = PersistedState::default();

        if let Ok(contents) = fs::read_to_string(&participants_path) {
            match serde_json::from_str(&contents) {
                Ok(participants) => state.participants = participants,
                Err(e) => {
                    warn!(path = %participants_path.display(), error = %e,
                        "roster document failed to parse, starting with an empty roster");
                }
            }
        }

        if let Ok(contents) = fs::read_to_string(&config_path) {
            match serde_json::from_str(&contents) {
                Ok(config) => state.config = config,
                Err(e) => {
                    warn!(path = %config_path.display(), error = %e,
                        "config document failed to parse, using defaults");
                }
            }
        }

        if let Ok(contents) = fs::read_to_string(&history_path) {
            match serde_json::from_str(&contents) {
                Ok(value) => state.history = history::parse_history(value),
                Err(e) => {
                    warn!(path = %history_path.display(), error = %e,
                        "history document failed to parse, starting empty");
                }
            }
        }

        info!(
            participants = state.participants.len(),
            history = state.history.len(),
            dir = %self.dir.display(),
            "loaded persisted state"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        let participants = serde_json::to_string_pretty(&state.participants)
            .context("Failed to serialize roster document")?;
        let config = serde_json::to_string_pretty(&state.config)
            .context("Failed to serialize config document")?;
        let history = serde_json::to_string_pretty(&state.history)
            .context("Failed to serialize history document")?;

        self.write_document(&self.participants_path(), &participants)?;
        self.write_document(&self.config_path(), &config)?;
        self.write_document(&self.history_path(), &history)?;
        Ok(())
    }
}

/// Pretty JSON export of the roster, with a date-stamped filename
/// suggestion. Writing the file is the shell's job.
pub fn export_roster(participants: &[Participant]) -> Result<(String, String)> {
    let json = serde_json::to_string_pretty(participants).context("Failed to serialize roster")?;
    let filename = format!("participants-{}.json", Local::now().format("%Y-%m-%d"));
    Ok((filename, json))
}

/// Pretty JSON export of the history, with a date-stamped filename
/// suggestion.
pub fn export_history(records: &[HistoryRecord]) -> Result<(String, String)> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize history")?;
    let filename = format!("history-{}.json", Local::now().format("%Y-%m-%d"));
    Ok((filename, json))
}

/// In-memory store for tests: behaves like the key-value fallback the
/// browser build uses, minus the browser.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: std::sync::Mutex<Option<PersistedState>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Option<PersistedState> {
        self.state.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl StorePort for MemoryStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.state.lock().unwrap().clone())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

// Lets a test keep a handle on the store after the engine takes its Box.
#[cfg(test)]
impl StorePort for std::sync::Arc<MemoryStore> {
    fn load(&self) -> Result<Option<PersistedState>> {
        self.as_ref().load()
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        self.as_ref().save(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DrawMode;
    use crate::history::HistoryRecord;

    fn temp_store(tag: &str) -> FileStore {
        let dir = std::env::temp_dir().join(format!(
            "lucky-draw-test-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        FileStore::new(dir)
    }

    fn participant(id: i64, name: &str) -> Participant {
        Participant {
            id,
            name: name.to_string(),
            weight: 1,
            excluded: false,
        }
    }

    #[test]
    fn test_load_missing_dir_is_first_run() {
        let store = temp_store("first-run");
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let store = temp_store("round-trip");
        let state = PersistedState {
            participants: vec![participant(1, "Alice"), participant(2, "Bob")],
            config: DrawConfig {
                mode: DrawMode::Tournament,
                prize_name: "Grand".to_string(),
                ..DrawConfig::default()
            },
            history: vec![HistoryRecord::new(
                DrawMode::Classic,
                "Prize".to_string(),
                vec![participant(1, "Alice")],
                2,
                None,
                Some(vec![participant(1, "Alice"), participant(2, "Bob")]),
            )],
        };

        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_corrupt_documents_degrade_to_defaults() {
        let store = temp_store("corrupt");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.participants_path(), "{not json").unwrap();
        fs::write(store.config_path(), "[]").unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.participants.is_empty());
        assert_eq!(loaded.config, DrawConfig::default());

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_legacy_history_discarded_on_load() {
        let store = temp_store("legacy");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(
            store.history_path(),
            r#"[{"id": 1, "date": "x", "mode": "classic", "prizeName": "p",
                "winners": ["Alice"], "totalParticipants": 3}]"#,
        )
        .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.history.is_empty());

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_export_filenames_are_date_stamped() {
        let (roster_name, roster_json) = export_roster(&[participant(1, "Alice")]).unwrap();
        assert!(roster_name.starts_with("participants-"));
        assert!(roster_name.ends_with(".json"));
        assert!(roster_json.contains("Alice"));

        let (history_name, _) = export_history(&[]).unwrap();
        assert!(history_name.starts_with("history-"));
    }
}
