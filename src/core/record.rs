//! The record contract shared by every collection.
//!
//! Most record types derive these traits with `#[derive(Record)]`:
//!
//! ```ignore
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! #[record(kind = "supplier")]
//! pub struct Supplier {
//!     pub id: RecordId,
//!     #[record(required, search)]
//!     pub name: String,
//! }
//! ```

use super::error::{FieldIssue, FieldProblem, ValidationError};
use super::id::RecordId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

pub trait Record: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Singular name used in error messages and logs.
    const KIND: &'static str;

    fn id(&self) -> &RecordId;

    /// Required-field checks run before a record enters a collection.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Text fields scanned by the search view.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;
}

pub trait SearchText {
    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>);
}

impl SearchText for String {
    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(self.as_str());
    }
}

impl SearchText for RecordId {
    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(self.as_str());
    }
}

impl<T: SearchText> SearchText for Option<T> {
    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(value) = self {
            value.collect_text(out);
        }
    }
}

/// Truthiness for required fields: blank strings and `None` are missing.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for str {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Presence for String {
    fn is_present(&self) -> bool {
        self.as_str().is_present()
    }
}

impl Presence for RecordId {
    fn is_present(&self) -> bool {
        !self.is_blank()
    }
}

impl<T: Presence> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(Presence::is_present)
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

pub trait Magnitude {
    /// `None` when the value is not a finite number.
    fn sign(&self) -> Option<bool>;
}

macro_rules! impl_magnitude_signed {
    ($($ty:ty),*) => {
        $(impl Magnitude for $ty {
            fn sign(&self) -> Option<bool> {
                Some(*self < 0 as $ty)
            }
        })*
    };
}

macro_rules! impl_magnitude_unsigned {
    ($($ty:ty),*) => {
        $(impl Magnitude for $ty {
            fn sign(&self) -> Option<bool> {
                Some(false)
            }
        })*
    };
}

impl_magnitude_signed!(i8, i16, i32, i64, isize);
impl_magnitude_unsigned!(u8, u16, u32, u64, usize);

impl Magnitude for f64 {
    fn sign(&self) -> Option<bool> {
        self.is_finite().then_some(*self < 0.0)
    }
}

impl Magnitude for f32 {
    fn sign(&self) -> Option<bool> {
        self.is_finite().then_some(*self < 0.0)
    }
}

impl<T: Magnitude> Magnitude for Option<T> {
    fn sign(&self) -> Option<bool> {
        match self {
            Some(value) => value.sign(),
            None => Some(false),
        }
    }
}

/// Collects field issues and turns them into one `ValidationError`.
#[derive(Debug)]
pub struct Validator {
    kind: &'static str,
    issues: Vec<FieldIssue>,
}

impl Validator {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            issues: Vec::new(),
        }
    }

    pub fn require<T: Presence + ?Sized>(&mut self, field: &'static str, value: &T) -> &mut Self {
        if !value.is_present() {
            self.push(field, FieldProblem::Missing);
        }
        self
    }

    pub fn non_negative<T: Magnitude + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> &mut Self {
        match value.sign() {
            Some(false) => {}
            Some(true) => self.push(field, FieldProblem::Negative),
            None => self.push(field, FieldProblem::NotFinite),
        }
        self
    }

    pub fn push(&mut self, field: &'static str, problem: FieldProblem) {
        self.issues.push(FieldIssue { field, problem });
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                kind: self.kind,
                issues: self.issues,
            })
        }
    }
}
