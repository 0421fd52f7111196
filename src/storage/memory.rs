use super::engine::{DEFAULT_QUOTA_BYTES, KeyValueStore, check_quota};
use crate::core::PersistenceError;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Process-local store. Nothing survives the process; used for tests and
/// throwaway sessions.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_quota(Some(DEFAULT_QUOTA_BYTES))
    }

    pub fn with_quota(quota: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self.entries.read()?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        check_quota(key, value, self.quota)?;
        let mut entries = self.entries.write()?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, PersistenceError> {
        let mut entries = self.entries.write()?;
        Ok(entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        let entries = self.entries.read()?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_overwrites_previous_value() {
        let store = MemoryStore::new();
        assert_eq!(store.load("pets-animals").unwrap(), None);

        store.save("pets-animals", "[]").unwrap();
        store.save("pets-animals", "[{\"id\":\"1\"}]").unwrap();

        assert_eq!(
            store.load("pets-animals").unwrap().as_deref(),
            Some("[{\"id\":\"1\"}]")
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn quota_rejects_oversized_values_without_writing() {
        let store = MemoryStore::with_quota(Some(8));
        store.save("k", "[]").unwrap();

        let err = store.save("k", "[1,2,3,4,5]").unwrap_err();
        assert_eq!(
            err,
            PersistenceError::QuotaExceeded {
                key: "k".to_string(),
                size: 11,
                limit: 8
            }
        );
        assert_eq!(store.load("k").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn keys_are_sorted_and_filterable() {
        let store = MemoryStore::new();
        store.save("crm-quotes", "[]").unwrap();
        store.save("crm-clients", "[]").unwrap();
        store.save("taxi-rides", "[]").unwrap();

        assert_eq!(
            store.keys().unwrap(),
            vec!["crm-clients", "crm-quotes", "taxi-rides"]
        );
        assert_eq!(
            store.keys_with_prefix("crm-").unwrap(),
            vec!["crm-clients", "crm-quotes"]
        );
        assert!(store.remove("taxi-rides").unwrap());
        assert!(!store.remove("taxi-rides").unwrap());
    }
}
