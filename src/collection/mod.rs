//! One named array of records kept in sync with a key-value store.
//!
//! Every mutation goes through [`Collection::commit`]: the next state is
//! encoded and written first, and replaces the in-memory state only once the
//! write succeeded. The empty collection is written like any other state.

pub mod crud;
pub mod relations;

use crate::config::ConflictPolicy;
use crate::core::{
    HasStatus, IdGenerator, PersistenceError, Record, RecordError, RecordId, Result, Searchable,
};
use crate::storage::KeyValueStore;
use crate::storage::codec;
use crate::view;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub use relations::{Dependent, Dependents, OnDelete, Relation, Removal, relabel_dependents};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    pub conflict_policy: ConflictPolicy,
    pub pretty: bool,
}

pub struct Collection<R: Record> {
    key: String,
    store: Arc<dyn KeyValueStore>,
    records: Vec<R>,
    ids: IdGenerator,
    options: CollectionOptions,
    // Blob as last read from or written to the store; used to spot other writers.
    last_synced: Option<String>,
}

impl<R: Record> fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("key", &self.key)
            .field("kind", &R::KIND)
            .field("len", &self.records.len())
            .field("options", &self.options)
            .finish()
    }
}

impl<R: Record> Collection<R> {
    /// Loads `key` from the store, or installs and persists `seed()` when
    /// the key has never been written.
    pub fn open<F>(store: Arc<dyn KeyValueStore>, key: impl Into<String>, seed: F) -> Result<Self>
    where
        F: FnOnce() -> Vec<R>,
    {
        Self::open_with(store, key, CollectionOptions::default(), seed)
    }

    pub fn open_with<F>(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        options: CollectionOptions,
        seed: F,
    ) -> Result<Self>
    where
        F: FnOnce() -> Vec<R>,
    {
        let mut collection = Self {
            key: key.into(),
            store,
            records: Vec::new(),
            ids: IdGenerator::new(),
            options,
            last_synced: None,
        };
        collection.load_or_seed(seed)?;
        Ok(collection)
    }

    fn load_or_seed<F>(&mut self, seed: F) -> Result<()>
    where
        F: FnOnce() -> Vec<R>,
    {
        match self.store.load(&self.key)? {
            Some(raw) => {
                let records: Vec<R> = codec::decode(&self.key, &raw)?;
                if let Err(err) = ensure_unique_ids(&records) {
                    warn!(key = %self.key, kind = R::KIND, error = %err, "stored collection repeats an id");
                    return Err(err);
                }
                debug!(key = %self.key, kind = R::KIND, records = records.len(), "collection loaded");
                self.records = records;
                self.last_synced = Some(raw);
            }
            None => {
                let seeded = seed();
                ensure_valid(&seeded)?;
                self.last_synced = None;
                self.commit(seeded)?;
                debug!(key = %self.key, kind = R::KIND, records = self.records.len(), "collection seeded");
            }
        }
        Ok(())
    }

    /// Reads the store again. On failure the current state is kept.
    pub fn reload<F>(&mut self, seed: F) -> Result<()>
    where
        F: FnOnce() -> Vec<R>,
    {
        self.load_or_seed(seed)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> CollectionOptions {
        self.options
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        view::find(&self.records, id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    pub fn require(&self, id: &RecordId) -> Result<&R> {
        self.get(id).ok_or_else(|| not_found::<R>(id))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn count_where<P>(&self, pred: P) -> usize
    where
        P: Fn(&R) -> bool,
    {
        view::count_where(&self.records, pred)
    }

    pub fn sum_where<P, A>(&self, pred: P, amount: A) -> f64
    where
        P: Fn(&R) -> bool,
        A: Fn(&R) -> f64,
    {
        view::sum_where(&self.records, pred, amount)
    }

    pub fn filter<P>(&self, pred: P) -> Vec<&R>
    where
        P: Fn(&R) -> bool,
    {
        view::filter(&self.records, pred)
    }

    /// Writes `next` and adopts it as the current state.
    ///
    /// On any failure the in-memory state is left untouched.
    pub(crate) fn commit(&mut self, next: Vec<R>) -> Result<()> {
        let encoded = codec::encode(&self.key, &next, self.options.pretty)?;
        self.check_conflict()?;

        if let Err(err) = self.store.save(&self.key, &encoded) {
            error!(key = %self.key, kind = R::KIND, error = %err, "failed to persist collection");
            return Err(err.into());
        }

        debug!(key = %self.key, records = next.len(), bytes = encoded.len(), "collection persisted");
        self.records = next;
        self.last_synced = Some(encoded);
        Ok(())
    }

    /// Fails with a conflict if the next write would be refused.
    ///
    /// Multi-collection operations call this on every collection they are
    /// about to write before writing any of them.
    pub fn ensure_writable(&self) -> Result<()> {
        if self.options.conflict_policy == ConflictPolicy::FailFast && self.changed_elsewhere()? {
            return Err(PersistenceError::Conflict {
                key: self.key.clone(),
            }
            .into());
        }
        Ok(())
    }

    // Blobs that differ only in formatting (e.g. `pretty`) hold the same state.
    fn changed_elsewhere(&self) -> std::result::Result<bool, PersistenceError> {
        let current = self.store.load(&self.key)?;
        let changed = match (current.as_deref(), self.last_synced.as_deref()) {
            (Some(stored), Some(synced)) => {
                stored != synced && !codec::same_content(stored, synced)
            }
            (stored, synced) => stored != synced,
        };
        Ok(changed)
    }

    fn check_conflict(&self) -> std::result::Result<(), PersistenceError> {
        if !self.changed_elsewhere()? {
            return Ok(());
        }
        match self.options.conflict_policy {
            ConflictPolicy::LastWriteWins => {
                warn!(
                    key = %self.key,
                    kind = R::KIND,
                    "stored collection changed since last read; overwriting"
                );
                Ok(())
            }
            ConflictPolicy::FailFast => Err(PersistenceError::Conflict {
                key: self.key.clone(),
            }),
        }
    }
}

impl<R: Record + Searchable> Collection<R> {
    pub fn search(&self, query: &str) -> Vec<&R> {
        view::search(&self.records, query)
    }
}

impl<R: HasStatus> Collection<R> {
    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        view::bucket_counts(&self.records, R::status)
    }

    pub fn with_status(&self, status: R::Status) -> Vec<&R> {
        self.filter(|record| record.status() == status)
    }
}

pub(crate) fn not_found<R: Record>(id: &RecordId) -> RecordError {
    RecordError::NotFound {
        kind: R::KIND,
        id: id.to_string(),
    }
}

pub(crate) fn ensure_valid<R: Record>(records: &[R]) -> Result<()> {
    for record in records {
        record.validate()?;
    }
    ensure_unique_ids(records)
}

fn ensure_unique_ids<R: Record>(records: &[R]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id()) {
            return Err(RecordError::DuplicateId {
                kind: R::KIND,
                id: record.id().to_string(),
            });
        }
    }
    Ok(())
}
