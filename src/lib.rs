// ============================================================================
// recordkeep Library
// ============================================================================
//
// Typed record collections backed by a key-value store: load-or-seed on open,
// full-collection write after every change, derived views for dashboards.

extern crate self as recordkeep;

mod macros;

pub mod collection;
pub mod config;
pub mod core;
pub mod domains;
pub mod manager;
pub mod storage;
pub mod view;

pub use crate::collection::{
    Collection, CollectionOptions, Dependent, Dependents, OnDelete, Relation, Removal,
    relabel_dependents,
};
pub use crate::config::{Backend, ConfigError, ConflictPolicy, StoreConfig};
pub use crate::core::timestamp;
pub use crate::core::{
    FieldIssue, FieldProblem, HasStatus, IdGenerator, Lifecycle, Magnitude, PersistenceError,
    Presence, Record, RecordError, RecordId, Result, SearchText, Searchable, ValidationError,
    Validator,
};
pub use crate::manager::RecordManager;
pub use crate::storage::{DEFAULT_QUOTA_BYTES, FileStore, KeyValueStore, MemoryStore};

pub use recordkeep_derive::Record;
