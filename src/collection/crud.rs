use super::{Collection, ensure_valid, not_found};
use crate::core::{
    FieldProblem, HasStatus, Lifecycle, Record, RecordError, RecordId, Result, ValidationError,
};

impl<R: Record> Collection<R> {
    /// A timestamp id not used by any record in this collection.
    pub fn next_id(&mut self) -> RecordId {
        let records = &self.records;
        self.ids
            .next_id(|candidate| records.iter().any(|record| record.id() == candidate))
    }

    /// Builds a record around a fresh id, validates it and appends it.
    pub fn create<F>(&mut self, build: F) -> Result<R>
    where
        F: FnOnce(RecordId) -> R,
    {
        let id = self.next_id();
        let record = build(id.clone());
        if record.id() != &id {
            return Err(ValidationError::single(R::KIND, "id", FieldProblem::IdChanged).into());
        }
        self.insert(record.clone())?;
        Ok(record)
    }

    /// Appends a fully built record. Its id must not be taken.
    pub fn insert(&mut self, record: R) -> Result<()> {
        record.validate()?;
        if self.contains(record.id()) {
            return Err(RecordError::DuplicateId {
                kind: R::KIND,
                id: record.id().to_string(),
            });
        }
        let mut next = self.records.clone();
        next.push(record);
        self.commit(next)
    }

    /// Applies `edit` to a copy of the record, validates and persists it.
    pub fn update<F>(&mut self, id: &RecordId, edit: F) -> Result<R>
    where
        F: FnOnce(&mut R),
    {
        let index = self.position(id)?;
        let mut updated = self.records[index].clone();
        edit(&mut updated);
        if updated.id() != id {
            return Err(ValidationError::single(R::KIND, "id", FieldProblem::IdChanged).into());
        }
        updated.validate()?;

        let mut next = self.records.clone();
        next[index] = updated.clone();
        self.commit(next)?;
        Ok(updated)
    }

    /// Replaces the stored record carrying the same id.
    pub fn replace(&mut self, record: R) -> Result<R> {
        let id = record.id().clone();
        self.update(&id, move |current| *current = record)
    }

    pub fn remove(&mut self, id: &RecordId) -> Result<R> {
        let index = self.position(id)?;
        let mut next = self.records.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        Ok(removed)
    }

    /// Removes every matching record; nothing is written when none match.
    pub fn remove_where<P>(&mut self, pred: P) -> Result<Vec<R>>
    where
        P: Fn(&R) -> bool,
    {
        let (removed, kept): (Vec<R>, Vec<R>) =
            self.records.iter().cloned().partition(|record| pred(record));
        if removed.is_empty() {
            return Ok(removed);
        }
        self.commit(kept)?;
        Ok(removed)
    }

    /// Edits every matching record; nothing is written when none match.
    pub fn update_where<P, F>(&mut self, pred: P, edit: F) -> Result<usize>
    where
        P: Fn(&R) -> bool,
        F: Fn(&mut R),
    {
        let mut next = self.records.clone();
        let mut touched = 0;
        for record in next.iter_mut().filter(|record| pred(record)) {
            edit(record);
            record.validate()?;
            touched += 1;
        }
        if touched > 0 {
            self.commit(next)?;
        }
        Ok(touched)
    }

    /// Removes all records and persists the empty collection.
    pub fn clear(&mut self) -> Result<usize> {
        let count = self.records.len();
        self.commit(Vec::new())?;
        Ok(count)
    }

    /// Swaps the whole collection, e.g. for an import.
    pub fn replace_all(&mut self, records: Vec<R>) -> Result<()> {
        ensure_valid(&records)?;
        self.commit(records)
    }

    fn position(&self, id: &RecordId) -> Result<usize> {
        self.records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| not_found::<R>(id))
    }
}

impl<R: HasStatus> Collection<R> {
    /// Moves a record to `next` if its lifecycle allows it.
    ///
    /// Staying in the current state succeeds without writing.
    pub fn transition(&mut self, id: &RecordId, next: R::Status) -> Result<R> {
        self.transition_with(id, next, |_| {})
    }

    /// Like [`transition`](Self::transition), applying `edit` in the same write.
    pub fn transition_with<F>(&mut self, id: &RecordId, next: R::Status, edit: F) -> Result<R>
    where
        F: FnOnce(&mut R),
    {
        let from = self.require(id)?.status();
        if from == next {
            return Ok(self.require(id)?.clone());
        }
        self.ensure_transition(id, next)?;
        self.update(id, |record| {
            record.set_status(next);
            record.on_transition(from);
            edit(record);
        })
    }

    /// Checks that `id` exists and may move to `next`, without writing.
    pub fn ensure_transition(&self, id: &RecordId, next: R::Status) -> Result<()> {
        let from = self.require(id)?.status();
        if !from.can_become(next) {
            return Err(RecordError::InvalidTransition {
                kind: R::KIND,
                id: id.to_string(),
                from: from.label(),
                to: next.label(),
            });
        }
        Ok(())
    }
}
