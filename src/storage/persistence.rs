//! Directory-backed store: one JSON file per key, replaced atomically.

use super::engine::{DEFAULT_QUOTA_BYTES, KeyValueStore, check_quota};
use crate::core::PersistenceError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    quota: Option<usize>,
}

impl FileStore {
    /// Opens (and creates if needed) the store directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, PersistenceError> {
        Self::open_with_quota(root, Some(DEFAULT_QUOTA_BYTES))
    }

    pub fn open_with_quota<P: AsRef<Path>>(
        root: P,
        quota: Option<usize>,
    ) -> Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            PersistenceError::Unavailable(format!(
                "Failed to create store directory '{}': {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root, quota })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{}.{}", key, EXTENSION)))
    }
}

/// Keys become file names, so only a conservative alphabet is allowed.
pub fn validate_key(key: &str) -> Result<(), PersistenceError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidKey(key.to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Read {
                key: key.to_string(),
                reason: format!("{}: {}", path.display(), e),
            }),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        check_quota(key, value, self.quota)?;

        let write_err = |reason: String| PersistenceError::Write {
            key: key.to_string(),
            reason,
        };

        let mut temp = NamedTempFile::new_in(&self.root)
            .map_err(|e| write_err(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(value.as_bytes())
            .map_err(|e| write_err(format!("Failed to write temp file: {}", e)))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| write_err(format!("Failed to sync temp file: {}", e)))?;
        temp.persist(&path).map_err(|e| {
            write_err(format!(
                "Failed to rename temp file -> '{}': {}",
                path.display(),
                e.error
            ))
        })?;

        debug!(key = %key, bytes = value.len(), path = %path.display(), "value written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PersistenceError::Write {
                key: key.to_string(),
                reason: format!("Failed to remove '{}': {}", path.display(), e),
            }),
        }
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            PersistenceError::Unavailable(format!(
                "Failed to list store directory '{}': {}",
                self.root.display(),
                e
            ))
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if validate_key(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rejects_keys_that_escape_the_directory() {
        assert!(validate_key("car-parts-parts").is_ok());
        assert!(validate_key("v2.sales_archive").is_ok());
        for bad in ["", "../etc", "a/b", ".hidden", "with space"] {
            assert_eq!(
                validate_key(bad),
                Err(PersistenceError::InvalidKey(bad.to_string()))
            );
        }
    }

    #[test]
    fn values_survive_reopening_the_directory() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(temp_dir.path()).unwrap();
            store.save("pizza-orders", "[{\"id\":\"1\"}]").unwrap();
        }

        let store = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(
            store.load("pizza-orders").unwrap().as_deref(),
            Some("[{\"id\":\"1\"}]")
        );
        assert!(temp_dir.path().join("pizza-orders.json").exists());
    }

    #[test]
    fn keys_ignore_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.save("b-key", "[]").unwrap();
        store.save("a-key", "[]").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["a-key", "b-key"]);
    }
}
