//! Key-value persistence for client state

use crate::error::{InsightError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Key holding the saved API key
pub const CREDENTIAL_KEY: &str = "gemini_api_key";

/// Key holding the JSON array of recent topics
pub const HISTORY_KEY: &str = "market_insight_history";

/// Read-modify-write step for [`KeyValueStore::update`]; `None` removes the key
pub type Change<'a> = dyn FnMut(Option<&str>) -> Result<Option<String>> + 'a;

/// String key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Replace the value under `key` with `change(current)`
    ///
    /// Runs under the store's lock, so concurrent updates of one key never
    /// lose each other's writes.
    fn update(&self, key: &str, change: &mut Change<'_>) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| InsightError::Storage(format!("Lock error: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .map_err(|e| InsightError::Storage(format!("Lock error: {e}")))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .map_err(|e| InsightError::Storage(format!("Lock error: {e}")))?
            .remove(key);
        Ok(())
    }

    fn update(&self, key: &str, change: &mut Change<'_>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| InsightError::Storage(format!("Lock error: {e}")))?;
        let next = change(entries.get(key).map(String::as_str))?;
        match next {
            Some(value) => entries.insert(key.to_string(), value),
            None => entries.remove(key),
        };
        Ok(())
    }
}

/// JSON-file backed store
///
/// The whole map is rewritten on every change through a temporary file and
/// a rename, so readers never see a half-written file. On Unix the file is
/// readable by its owner only. A file that cannot be parsed is treated as
/// empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "State file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened state file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let body = serde_json::to_string_pretty(entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(body.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Apply `change` to a copy and keep it only once it is on disk
    fn commit<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> Result<bool>,
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| InsightError::Storage(format!("Lock error: {e}")))?;
        let mut next = entries.clone();
        if change(&mut next)? {
            self.persist(&next)?;
            *entries = next;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| InsightError::Storage(format!("Lock error: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.commit(|entries| {
            Ok(entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value))
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.commit(|entries| Ok(entries.remove(key).is_some()))
    }

    fn update(&self, key: &str, change: &mut Change<'_>) -> Result<()> {
        self.commit(|entries| {
            let before = entries.get(key).cloned();
            match change(before.as_deref())? {
                Some(value) => entries.insert(key.to_string(), value),
                None => entries.remove(key),
            };
            Ok(entries.get(key) != before.as_ref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.remove("k").unwrap();
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set(CREDENTIAL_KEY, "AIzaTest").unwrap();
        store.set(HISTORY_KEY, "[\"台積電\"]").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(CREDENTIAL_KEY).unwrap().as_deref(),
            Some("AIzaTest")
        );
        assert_eq!(
            reopened.get(HISTORY_KEY).unwrap().as_deref(),
            Some("[\"台積電\"]")
        );

        reopened.remove(CREDENTIAL_KEY).unwrap();
        let again = FileStore::open(&path).unwrap();
        assert_eq!(again.get(CREDENTIAL_KEY).unwrap(), None);
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_update_sees_current_value() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileStore::open(dir.path().join("state.json")).unwrap();
        let memory = InMemoryStore::new();

        for store in [&file as &dyn KeyValueStore, &memory] {
            store.update("n", &mut |current| {
                assert_eq!(current, None);
                Ok(Some("1".to_string()))
            })
            .unwrap();
            store.update("n", &mut |current| {
                let n: u32 = current.unwrap().parse().unwrap();
                Ok(Some((n + 1).to_string()))
            })
            .unwrap();
            assert_eq!(store.get("n").unwrap().as_deref(), Some("2"));

            store.update("n", &mut |_| Ok(None)).unwrap();
            assert_eq!(store.get("n").unwrap(), None);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_state_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = FileStore::open(&path).unwrap();
        store.set(CREDENTIAL_KEY, "AIzaPrivate").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "state file mode {mode:o}");
    }

    #[test]
    fn test_failed_write_leaves_entries_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        let store = FileStore::open(blocked.join("state.json")).unwrap();
        fs::write(&blocked, "not a directory").unwrap();

        assert!(store.set(CREDENTIAL_KEY, "AIzaLost").is_err());
        assert_eq!(store.get(CREDENTIAL_KEY).unwrap(), None);
        assert!(store.update(HISTORY_KEY, &mut |_| Ok(Some("[]".to_string()))).is_err());
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_treats_corrupt_file_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);

        store.set(HISTORY_KEY, "[]").unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(HISTORY_KEY));
    }

    #[test]
    fn test_missing_file_is_not_created_until_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = FileStore::open(&path).unwrap();
        assert!(!path.exists());
        store.remove(CREDENTIAL_KEY).unwrap();
        assert!(!path.exists());
        store.set(CREDENTIAL_KEY, "x").unwrap();
        assert!(path.exists());
    }
}
