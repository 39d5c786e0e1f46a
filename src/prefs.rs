//! Client preference persistence
//!
//! Remembers the active model and the last session id across process
//! restarts. The `ChatClient` saves after a model refresh and whenever the
//! server announces a session.

use crate::error::{ChatError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted client preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Model id selected for new messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Session to resume after a restart or reconnect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Preferences {
    /// Stamp `updated_at` with the current time
    pub fn touch(mut self) -> Self {
        self.updated_at = Some(Utc::now());
        self
    }
}

/// Trait for persisting client preferences
pub trait PreferenceStore: Send + Sync {
    /// Save preferences, replacing any previous value
    fn save(&self, prefs: &Preferences) -> Result<()>;

    /// Load preferences (defaults if nothing was saved)
    fn load(&self) -> Result<Preferences>;
}

/// JSON file-based preference store
///
/// Atomic writes via temp file + rename to prevent corruption.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn save(&self, prefs: &Preferences) -> Result<()> {
        let json = serde_json::to_string_pretty(prefs)?;
        let tmp_path = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatError::Config(format!(
                    "Failed to create preference directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        std::fs::write(&tmp_path, json).map_err(|e| {
            ChatError::Config(format!(
                "Failed to write preference file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            ChatError::Config(format!(
                "Failed to rename preference file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            model = ?prefs.model,
            "Preferences saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            ChatError::Config(format!(
                "Failed to read preference file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        serde_json::from_str(&json).map_err(|e| {
            ChatError::Config(format!(
                "Failed to parse preference file {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// In-memory preference store for testing
#[derive(Default)]
pub struct MemoryPreferenceStore {
    prefs: std::sync::RwLock<Preferences>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn save(&self, prefs: &Preferences) -> Result<()> {
        let mut state = self.prefs.write().map_err(|e| {
            ChatError::Config(format!("Failed to acquire preference lock: {}", e))
        })?;
        *state = prefs.clone();
        Ok(())
    }

    fn load(&self) -> Result<Preferences> {
        let state = self.prefs.read().map_err(|e| {
            ChatError::Config(format!("Failed to acquire preference lock: {}", e))
        })?;
        Ok(state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Preferences {
        Preferences {
            model: Some("gpt-4.1".to_string()),
            last_session_id: Some("abc".to_string()),
            updated_at: None,
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("a3s-chat-test-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_memory_store_save_load() {
        let store = MemoryPreferenceStore::default();
        assert_eq!(store.load().unwrap(), Preferences::default());

        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(loaded.last_session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_file_store_save_load() {
        let dir = temp_dir();
        let path = dir.join("prefs.json");
        let store = FilePreferenceStore::new(&path);

        store.save(&sample().touch()).unwrap();
        assert!(path.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.model.as_deref(), Some("gpt-4.1"));
        assert!(loaded.updated_at.is_some());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("lastSessionId"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_load_nonexistent() {
        let store = FilePreferenceStore::new(temp_dir().join("missing.json"));
        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FilePreferenceStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_atomic_write() {
        let dir = temp_dir();
        let path = dir.join("nested").join("prefs.json");
        let store = FilePreferenceStore::new(&path);

        store.save(&sample()).unwrap();
        store.save(&Preferences::default()).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(store.load().unwrap(), Preferences::default());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
