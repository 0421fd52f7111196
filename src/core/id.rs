use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a record, stable for its whole lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for RecordId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RecordId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Issues timestamp-based ids (milliseconds since the epoch).
///
/// Ids are strictly increasing per generator; a candidate already present in
/// the collection is bumped until it is free.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    last_issued: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, taken: impl Fn(&str) -> bool) -> RecordId {
        self.next_at(Utc::now().timestamp_millis(), taken)
    }

    pub fn next_at(&mut self, now_millis: i64, taken: impl Fn(&str) -> bool) -> RecordId {
        let mut candidate = now_millis.max(self.last_issued + 1);
        while taken(&candidate.to_string()) {
            candidate += 1;
        }
        self.last_issued = candidate;
        RecordId(candidate.to_string())
    }
}
