use std::fmt;
use thiserror::Error;

/// What is wrong with a single field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    Missing,
    Negative,
    NotFinite,
    IdChanged,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FieldProblem::Missing => "is required",
            FieldProblem::Negative => "must not be negative",
            FieldProblem::NotFinite => "must be a finite number",
            FieldProblem::IdChanged => "cannot be changed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.field, self.problem)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind}: {}", format_issues(.issues))]
pub struct ValidationError {
    pub kind: &'static str,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(kind: &'static str, field: &'static str, problem: FieldProblem) -> Self {
        Self {
            kind,
            issues: vec![FieldIssue { field, problem }],
        }
    }

    pub fn has_issue(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("Failed to write '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("Failed to encode '{key}': {reason}")]
    Encode { key: String, reason: String },

    #[error("Stored value for '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Value for '{key}' is {size} bytes, quota is {limit} bytes")]
    QuotaExceeded { key: String, size: usize, limit: usize },

    #[error("'{key}' was modified by another writer since it was last read")]
    Conflict { key: String },

    #[error("Invalid store key '{0}'")]
    InvalidKey(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    pub fn key(&self) -> Option<&str> {
        match self {
            PersistenceError::Read { key, .. }
            | PersistenceError::Write { key, .. }
            | PersistenceError::Encode { key, .. }
            | PersistenceError::Corrupt { key, .. }
            | PersistenceError::QuotaExceeded { key, .. }
            | PersistenceError::Conflict { key } => Some(key),
            PersistenceError::InvalidKey(key) => Some(key),
            PersistenceError::Unavailable(_) => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for PersistenceError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} '{id}' already exists")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{kind} '{id}' cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        kind: &'static str,
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("{kind} '{id}' cannot become '{status}' without {needs}")]
    MissingDetail {
        kind: &'static str,
        id: String,
        status: &'static str,
        needs: &'static str,
    },

    #[error("'{label}' is not a {kind} status")]
    UnknownStatus { kind: &'static str, label: String },

    #[error("Unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("Cannot delete {kind} '{id}': {count} {relation} record(s) still reference it")]
    Restricted {
        kind: &'static str,
        id: String,
        relation: &'static str,
        count: usize,
    },
}

pub type Result<T> = std::result::Result<T, RecordError>;
