//! Working set bound to the coordinator's attached store.
//!
//! A `Context` is not shared between threads directly; the engine keeps it
//! behind a mutex and only touches it from the foreground executor or from a
//! lifecycle handler.

use crate::core::error::{SaveError, StoreError};
use crate::core::provider::Coordinator;
use crate::core::record::{ChangeSet, FetchRequest, Record, RecordId, sort_records};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Opaque snapshot of staged changes, for rolling back a unit of work.
#[derive(Debug, Clone)]
pub struct Checkpoint(ChangeSet);

pub struct Context {
    coordinator: Arc<Coordinator>,
    changes: ChangeSet,
    /// Ids this context has fetched or inserted since the last reset.
    registered: FxHashSet<RecordId>,
}

impl Context {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            changes: ChangeSet::default(),
            registered: FxHashSet::default(),
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn insert(&mut self, record: Record) -> RecordId {
        let id = record.id.clone();
        self.registered.insert(id.clone());
        self.changes.upsert(record);
        id
    }

    /// Stages an update to a record this context already knows about.
    pub fn update(&mut self, record: Record) -> Result<(), StoreError> {
        if !self.registered.contains(&record.id) {
            return Err(StoreError::UnknownRecord(record.id));
        }
        self.changes.upsert(record);
        Ok(())
    }

    pub fn delete(&mut self, id: &RecordId) -> Result<(), StoreError> {
        if !self.registered.contains(id) || self.changes.deletes.contains(id) {
            return Err(StoreError::UnknownRecord(id.clone()));
        }
        self.changes.delete(id.clone());
        Ok(())
    }

    /// Store contents with staged changes applied, ordered by `(created_at, id)`.
    pub fn fetch(&mut self, request: &FetchRequest) -> Result<Vec<Record>, StoreError> {
        let store = self.coordinator.current()?;
        let stored = self.coordinator.provider().fetch(&store, request)?;

        let mut merged: Vec<Record> = stored
            .into_iter()
            .filter(|r| !self.changes.deletes.contains(&r.id))
            .filter(|r| !self.changes.upserts.contains_key(&r.id))
            .collect();
        merged.extend(
            self.changes
                .upserts
                .values()
                .filter(|r| request.matches(r))
                .cloned(),
        );
        sort_records(&mut merged);

        for record in &merged {
            self.registered.insert(record.id.clone());
        }
        Ok(merged)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.changes.clone())
    }

    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.changes = checkpoint.0;
    }

    /// Writes staged changes to the attached store. Staged changes are kept on
    /// failure so the caller decides whether to retry or reset.
    pub fn save(&mut self) -> Result<(), SaveError> {
        if !self.has_changes() {
            return Ok(());
        }
        let store = self.coordinator.current()?;
        self.coordinator.provider().save(&store, &self.changes)?;
        tracing::debug!(
            store = %store.location().display(),
            changes = self.changes.len(),
            "saved context"
        );
        self.changes = ChangeSet::default();
        Ok(())
    }

    /// Drops all staged changes and registered objects.
    pub fn reset(&mut self) {
        self.changes = ChangeSet::default();
        self.registered.clear();
        if let Ok(store) = self.coordinator.current() {
            self.coordinator.provider().reset(&store);
        }
    }
}
