pub mod error;
pub mod id;
pub mod record;
pub mod status;
pub mod timestamp;

pub use error::{FieldIssue, FieldProblem, PersistenceError, RecordError, Result, ValidationError};
pub use id::{IdGenerator, RecordId};
pub use record::{Magnitude, Presence, Record, SearchText, Searchable, Validator};
pub use status::{HasStatus, Lifecycle};
