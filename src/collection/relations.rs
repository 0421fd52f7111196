//! Declared links between collections.
//!
//! A dependent record points at its parent by id and usually carries a copy
//! of the parent's display label. Each link is declared once as a
//! [`Relation`] with an [`OnDelete`] rule, so deletes and renames treat every
//! dependent collection the same way.

use super::{Collection, not_found};
use crate::core::{Record, RecordError, RecordId, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Dependents are deleted with the parent.
    Cascade,
    /// The parent cannot be deleted while dependents reference it.
    Restrict,
    /// Dependents stay, with their reference and label cleared.
    Detach,
}

pub struct Relation<C: Record> {
    pub name: &'static str,
    pub on_delete: OnDelete,
    parent_id: fn(&C) -> Option<&RecordId>,
    detach: Option<fn(&mut C)>,
    label: Option<fn(&mut C) -> &mut String>,
}

impl<C: Record> Relation<C> {
    pub const fn cascade(name: &'static str, parent_id: fn(&C) -> Option<&RecordId>) -> Self {
        Self {
            name,
            on_delete: OnDelete::Cascade,
            parent_id,
            detach: None,
            label: None,
        }
    }

    pub const fn restrict(name: &'static str, parent_id: fn(&C) -> Option<&RecordId>) -> Self {
        Self {
            name,
            on_delete: OnDelete::Restrict,
            parent_id,
            detach: None,
            label: None,
        }
    }

    /// `clear` must drop the reference (typically `field = None`).
    pub const fn detach(
        name: &'static str,
        parent_id: fn(&C) -> Option<&RecordId>,
        clear: fn(&mut C),
    ) -> Self {
        Self {
            name,
            on_delete: OnDelete::Detach,
            parent_id,
            detach: Some(clear),
            label: None,
        }
    }

    /// Field holding the denormalized parent label.
    pub const fn with_label(self, label: fn(&mut C) -> &mut String) -> Self {
        Self {
            label: Some(label),
            ..self
        }
    }

    pub fn references(&self, record: &C, parent: &RecordId) -> bool {
        (self.parent_id)(record) == Some(parent)
    }
}

/// A dependent collection as seen from its parent.
pub trait Dependents {
    fn relation(&self) -> &'static str;

    fn on_delete(&self) -> OnDelete;

    /// Number of dependents pointing at `parent`.
    fn referencing(&self, parent: &RecordId) -> usize;

    /// See [`Collection::ensure_writable`].
    fn ensure_writable(&self) -> Result<()>;

    /// Applies the delete rule for a removed `parent`; returns records affected.
    fn release(&mut self, parent: &RecordId) -> Result<usize>;

    /// Rewrites the denormalized label on every dependent of `parent`.
    fn relabel(&mut self, parent: &RecordId, label: &str) -> Result<usize>;
}

pub struct Dependent<'a, C: Record> {
    collection: &'a mut Collection<C>,
    relation: &'a Relation<C>,
}

impl<'a, C: Record> Dependent<'a, C> {
    pub fn new(collection: &'a mut Collection<C>, relation: &'a Relation<C>) -> Self {
        Self {
            collection,
            relation,
        }
    }
}

impl<C: Record> Dependents for Dependent<'_, C> {
    fn relation(&self) -> &'static str {
        self.relation.name
    }

    fn on_delete(&self) -> OnDelete {
        self.relation.on_delete
    }

    fn referencing(&self, parent: &RecordId) -> usize {
        self.collection
            .count_where(|record| self.relation.references(record, parent))
    }

    fn ensure_writable(&self) -> Result<()> {
        self.collection.ensure_writable()
    }

    fn release(&mut self, parent: &RecordId) -> Result<usize> {
        let relation = self.relation;
        let affected = match relation.on_delete {
            OnDelete::Restrict => 0,
            OnDelete::Cascade => self
                .collection
                .remove_where(|record| relation.references(record, parent))?
                .len(),
            OnDelete::Detach => {
                let clear = relation.detach;
                let label = relation.label;
                self.collection.update_where(
                    |record| relation.references(record, parent),
                    |record| {
                        if let Some(clear) = clear {
                            clear(record);
                        }
                        if let Some(label) = label {
                            label(record).clear();
                        }
                    },
                )?
            }
        };
        debug!(relation = relation.name, parent = %parent, affected, "dependents released");
        Ok(affected)
    }

    fn relabel(&mut self, parent: &RecordId, label: &str) -> Result<usize> {
        let relation = self.relation;
        let Some(label_of) = relation.label else {
            return Ok(0);
        };
        self.collection.update_where(
            |record| relation.references(record, parent),
            |record| {
                let current = label_of(record);
                current.clear();
                current.push_str(label);
            },
        )
    }
}

/// Result of deleting a parent record.
#[derive(Debug, Clone)]
pub struct Removal<R> {
    pub record: R,
    pub released: Vec<(&'static str, usize)>,
}

impl<R> Removal<R> {
    pub fn released_for(&self, relation: &str) -> usize {
        self.released
            .iter()
            .find(|(name, _)| *name == relation)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

impl<R: Record> Collection<R> {
    /// Deletes `id` after applying every dependent's delete rule.
    ///
    /// Restrict rules and write conflicts are checked before anything is
    /// written. Dependents are released before the parent is removed, so a
    /// failed write never leaves a reference to a missing parent. Cascades
    /// are one level deep: dependents of dependents must be declared on
    /// their own parent.
    pub fn remove_with(
        &mut self,
        id: &RecordId,
        dependents: &mut [&mut dyn Dependents],
    ) -> Result<Removal<R>> {
        if !self.contains(id) {
            return Err(not_found::<R>(id));
        }

        self.ensure_writable()?;
        for dependent in dependents.iter() {
            let count = dependent.referencing(id);
            if count == 0 {
                continue;
            }
            if dependent.on_delete() == OnDelete::Restrict {
                return Err(RecordError::Restricted {
                    kind: R::KIND,
                    id: id.to_string(),
                    relation: dependent.relation(),
                    count,
                });
            }
            dependent.ensure_writable()?;
        }

        let mut released = Vec::with_capacity(dependents.len());
        for dependent in dependents.iter_mut() {
            if dependent.on_delete() == OnDelete::Restrict {
                continue;
            }
            let affected = dependent.release(id)?;
            released.push((dependent.relation(), affected));
        }
        let record = self.remove(id)?;

        Ok(Removal { record, released })
    }
}

/// Pushes a parent's new label to all of its dependents.
pub fn relabel_dependents(
    parent: &RecordId,
    label: &str,
    dependents: &mut [&mut dyn Dependents],
) -> Result<usize> {
    let mut total = 0;
    for dependent in dependents.iter_mut() {
        total += dependent.relabel(parent, label)?;
    }
    Ok(total)
}
