use crate::collection::{Collection, CollectionOptions};
use crate::config::{ConflictPolicy, StoreConfig};
use crate::core::{Record, Result};
use crate::storage::KeyValueStore;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A domain's namespace over a key-value store.
///
/// Every collection of a domain lives under `"<domain>-<collection>"`.
///
/// # Examples
///
/// ```
/// use recordkeep::{RecordManager, StoreConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = RecordManager::from_config(&StoreConfig::memory(), "pizza")?;
/// assert_eq!(manager.key_for("orders"), "pizza-orders");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RecordManager {
    store: Arc<dyn KeyValueStore>,
    domain: String,
    options: CollectionOptions,
}

impl fmt::Debug for RecordManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordManager")
            .field("domain", &self.domain)
            .field("options", &self.options)
            .finish()
    }
}

impl RecordManager {
    pub fn new(store: Arc<dyn KeyValueStore>, domain: impl Into<String>) -> Self {
        Self {
            store,
            domain: domain.into(),
            options: CollectionOptions::default(),
        }
    }

    pub fn from_config(config: &StoreConfig, domain: impl Into<String>) -> Result<Self> {
        let store = config.open_store()?;
        Ok(Self::new(store, domain)
            .conflict_policy(config.conflict_policy)
            .pretty(config.pretty))
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.options.conflict_policy = policy;
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.options.pretty = pretty;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn key_for(&self, collection: &str) -> String {
        format!("{}-{}", self.domain, collection)
    }

    /// Opens (load-or-seed) one collection of this domain.
    pub fn open<R, F>(&self, collection: &str, seed: F) -> Result<Collection<R>>
    where
        R: Record,
        F: FnOnce() -> Vec<R>,
    {
        Collection::open_with(
            Arc::clone(&self.store),
            self.key_for(collection),
            self.options,
            seed,
        )
    }

    /// Keys of this domain present in the store.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.store.keys_with_prefix(&format!("{}-", self.domain))?)
    }

    pub fn raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.load(key)?)
    }

    /// Removes every key of this domain; the next open re-seeds.
    pub fn reset(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.keys()? {
            if self.store.remove(&key)? {
                removed += 1;
            }
        }
        info!(domain = %self.domain, removed, "domain reset");
        Ok(removed)
    }
}
