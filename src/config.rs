use crate::core::PersistenceError;
use crate::storage::{DEFAULT_QUOTA_BYTES, FileStore, KeyValueStore, MemoryStore};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported store URL '{0}': expected memory:// or file://<path>")]
    UnsupportedScheme(String),

    #[error("Store URL '{0}' has no directory path")]
    MissingPath(String),

    #[error("Invalid value '{value}' for '{param}'")]
    InvalidParam { param: String, value: String },

    #[error("Unknown store URL parameter '{0}'")]
    UnknownParam(String),
}

/// What a collection does when the stored blob changed behind its back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Log a warning and overwrite.
    #[default]
    LastWriteWins,
    /// Refuse the write with `PersistenceError::Conflict`.
    FailFast,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::LastWriteWins => "last-write-wins",
            ConflictPolicy::FailFast => "fail-fast",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "lww" => Ok(ConflictPolicy::LastWriteWins),
            "fail-fast" | "fail" => Ok(ConflictPolicy::FailFast),
            _ => Err(ConfigError::InvalidParam {
                param: "conflict".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Directory(PathBuf),
}

/// Store configuration
///
/// Built with the builder methods or parsed from a store URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: Backend,

    /// Largest value accepted per key, `None` for unlimited
    pub quota_bytes: Option<usize>,

    pub conflict_policy: ConflictPolicy,

    /// Pretty-print stored JSON (easier to diff, larger on disk)
    pub pretty: bool,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            conflict_policy: ConflictPolicy::default(),
            pretty: false,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Directory(path.into()),
            ..Self::memory()
        }
    }

    pub fn quota_bytes(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    pub fn unlimited(mut self) -> Self {
        self.quota_bytes = None;
        self
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Parse from a store URL
    ///
    /// Format: `memory://` or `file://<path>`, optionally followed by
    /// `?quota=<bytes|none>&conflict=<last-write-wins|fail-fast>&pretty=<bool>`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use recordkeep::{StoreConfig, ConflictPolicy};
    /// let config = StoreConfig::from_url("file:///var/lib/dash?conflict=fail-fast").unwrap();
    /// assert_eq!(config.conflict_policy, ConflictPolicy::FailFast);
    /// ```
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let (location, query) = match url.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url, None),
        };

        let mut config = if let Some(rest) = location.strip_prefix("memory://") {
            if !rest.is_empty() {
                return Err(ConfigError::UnsupportedScheme(url.to_string()));
            }
            Self::memory()
        } else if let Some(path) = location.strip_prefix("file://") {
            if path.is_empty() {
                return Err(ConfigError::MissingPath(url.to_string()));
            }
            Self::directory(path)
        } else {
            return Err(ConfigError::UnsupportedScheme(url.to_string()));
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (param, value) = pair.split_once('=').unwrap_or((pair, ""));
            let invalid = || ConfigError::InvalidParam {
                param: param.to_string(),
                value: value.to_string(),
            };
            match param {
                "quota" => {
                    config.quota_bytes = if value.eq_ignore_ascii_case("none") {
                        None
                    } else {
                        Some(value.parse().map_err(|_| invalid())?)
                    };
                }
                "conflict" => config.conflict_policy = value.parse()?,
                "pretty" => config.pretty = value.parse().map_err(|_| invalid())?,
                other => return Err(ConfigError::UnknownParam(other.to_string())),
            }
        }

        Ok(config)
    }

    /// Convert to store URL
    pub fn to_url(&self) -> String {
        let location = match &self.backend {
            Backend::Memory => "memory://".to_string(),
            Backend::Directory(path) => format!("file://{}", path.display()),
        };
        let quota = self
            .quota_bytes
            .map(|bytes| bytes.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "{}?quota={}&conflict={}&pretty={}",
            location, quota, self.conflict_policy, self.pretty
        )
    }

    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>, PersistenceError> {
        let store: Arc<dyn KeyValueStore> = match &self.backend {
            Backend::Memory => Arc::new(MemoryStore::with_quota(self.quota_bytes)),
            Backend::Directory(path) => {
                Arc::new(FileStore::open_with_quota(path, self.quota_bytes)?)
            }
        };
        Ok(store)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::memory()
    }
}
