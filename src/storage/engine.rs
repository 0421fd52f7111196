use crate::core::PersistenceError;

/// Roughly what a browser grants one origin in local storage.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Key-value store trait - allows pluggable persistence backends
///
/// Values are opaque strings. Implementations overwrite on `save` and never
/// merge.
pub trait KeyValueStore: Send + Sync {
    /// Raw value stored under `key`, `None` if it was never written
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store `value` under `key`, replacing any previous value
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Delete `key`; returns whether it existed
    fn remove(&self, key: &str) -> Result<bool, PersistenceError>;

    /// All keys currently stored, sorted
    fn keys(&self) -> Result<Vec<String>, PersistenceError>;

    /// Stored keys starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}

pub(crate) fn check_quota(
    key: &str,
    value: &str,
    quota: Option<usize>,
) -> Result<(), PersistenceError> {
    match quota {
        Some(limit) if value.len() > limit => Err(PersistenceError::QuotaExceeded {
            key: key.to_string(),
            size: value.len(),
            limit,
        }),
        _ => Ok(()),
    }
}
