//! Persisted session reference.
//!
//! Exactly one durable key, `sessionTopic`, holds the topic of the session
//! the manager believes is active. Absence is the canonical logged-out
//! state.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::Topic;

// ============================================================================
// Constants
// ============================================================================

/// Key holding the session topic.
pub const SESSION_TOPIC_KEY: &str = "sessionTopic";

/// Directory name under the user data dir.
const STORE_DIR: &str = "qubic-connect";

/// File name of the default store.
const STORE_FILE: &str = "session.json";

// ============================================================================
// SessionStore
// ============================================================================

/// Durable storage of the active session topic.
pub trait SessionStore: Send + Sync {
    /// Reads the stored topic.
    fn load(&self) -> Result<Option<Topic>>;

    /// Stores `topic`, replacing any previous value.
    fn save(&self, topic: &Topic) -> Result<()>;

    /// Removes the stored topic. Clearing an empty store is a no-op.
    fn clear(&self) -> Result<()>;
}

// ============================================================================
// MemorySessionStore
// ============================================================================

/// Process-local store. Forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    topic: Mutex<Option<Topic>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `topic`.
    #[must_use]
    pub fn with_topic(topic: Topic) -> Self {
        Self {
            topic: Mutex::new(Some(topic)),
        }
    }

    /// Returns the stored topic without going through the trait.
    #[must_use]
    pub fn peek(&self) -> Option<Topic> {
        self.topic.lock().clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Topic>> {
        Ok(self.peek())
    }

    fn save(&self, topic: &Topic) -> Result<()> {
        *self.topic.lock() = Some(topic.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.topic.lock().take();
        Ok(())
    }
}

// ============================================================================
// FileSessionStore
// ============================================================================

/// JSON file store.
///
/// The file is a flat object; keys other than `sessionTopic` are preserved.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Creates a store backed by `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the default location under the user data directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(STORE_DIR).join(STORE_FILE))
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file as a JSON object. Missing or corrupt files read as empty.
    fn read_map(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(Error::store(format!("{}: {e}", self.path.display()))),
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Session store is not a JSON object, ignoring");
                Ok(Map::new())
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        if map.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    Err(Error::store(format!("{}: {e}", self.path.display())))
                }
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Topic>> {
        let _guard = self.lock.lock();
        let map = self.read_map()?;

        Ok(map
            .get(SESSION_TOPIC_KEY)
            .and_then(Value::as_str)
            .and_then(Topic::new))
    }

    fn save(&self, topic: &Topic) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(
            SESSION_TOPIC_KEY.to_string(),
            Value::String(topic.to_string()),
        );
        self.write_map(&map)?;

        debug!(path = %self.path.display(), %topic, "Session topic persisted");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        if map.remove(SESSION_TOPIC_KEY).is_none() {
            return Ok(());
        }
        self.write_map(&map)?;

        debug!(path = %self.path.display(), "Session topic cleared");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().expect("load"), None);

        store.save(&Topic::from("T1")).expect("save");
        assert_eq!(store.load().expect("load"), Some(Topic::from("T1")));

        store.clear().expect("clear");
        store.clear().expect("clear twice");
        assert_eq!(store.peek(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempdir().expect("tempdir");
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.load().expect("load missing"), None);

        store.save(&Topic::from("T1")).expect("save");
        let reopened = FileSessionStore::new(store.path());
        assert_eq!(reopened.load().expect("load"), Some(Topic::from("T1")));

        reopened.clear().expect("clear");
        assert!(!store.path().exists());
        assert_eq!(store.load().expect("load cleared"), None);
    }

    #[test]
    fn test_file_store_preserves_other_keys() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"theme":"dark","sessionTopic":"T2"}"#).expect("seed");

        let store = FileSessionStore::new(&path);
        assert_eq!(store.load().expect("load"), Some(Topic::from("T2")));

        store.clear().expect("clear");
        let content = fs::read_to_string(&path).expect("read");
        assert!(content.contains("theme"));
        assert!(!content.contains(SESSION_TOPIC_KEY));
    }

    #[test]
    fn test_file_store_ignores_corrupt_content() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").expect("seed");

        let store = FileSessionStore::new(&path);
        assert_eq!(store.load().expect("load"), None);

        store.save(&Topic::from("T3")).expect("save over corrupt file");
        assert_eq!(store.load().expect("load"), Some(Topic::from("T3")));
    }

    #[test]
    fn test_empty_topic_reads_as_absent() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"sessionTopic":""}"#).expect("seed");

        assert_eq!(FileSessionStore::new(&path).load().expect("load"), None);
    }
}
