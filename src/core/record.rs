//! Object shape persisted by a store.

use crate::core::time;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identity of a record. ULID text, so lexical order follows creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new() -> Self {
        RecordId(time::new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Entity kind, e.g. `Favorite`.
    pub entity: String,
    /// Creation time in milliseconds; first half of the stable ordering.
    pub created_at: i64,
    pub attributes: BTreeMap<String, Value>,
    /// Named to-many relationships. A to-one relationship is a list of one.
    pub relationships: BTreeMap<String, Vec<RecordId>>,
}

impl Record {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            entity: entity.into(),
            created_at: time::now_millis(),
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_relationship(mut self, name: impl Into<String>, targets: Vec<RecordId>) -> Self {
        self.relationships.insert(name.into(), targets);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn references(&self, target: &RecordId) -> bool {
        self.relationships
            .values()
            .any(|targets| targets.contains(target))
    }

    /// Replaces every reference to `from` with `to`, without listing `to` twice.
    /// Returns whether anything changed.
    pub fn repoint(&mut self, from: &RecordId, to: &RecordId) -> bool {
        let mut changed = false;
        for targets in self.relationships.values_mut() {
            if !targets.contains(from) {
                continue;
            }
            let already_linked = targets.contains(to);
            let mut rewritten = Vec::with_capacity(targets.len());
            for target in targets.drain(..) {
                if &target == from {
                    if !already_linked && !rewritten.contains(to) {
                        rewritten.push(to.clone());
                    }
                } else {
                    rewritten.push(target);
                }
            }
            *targets = rewritten;
            changed = true;
        }
        changed
    }

    /// Sort key for the dedup tiebreak: creation time, then identity.
    pub fn order_key(&self) -> (i64, &RecordId) {
        (self.created_at, &self.id)
    }
}

/// Changes staged in a context and not yet written to its store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub upserts: BTreeMap<RecordId, Record>,
    pub deletes: BTreeSet<RecordId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn upsert(&mut self, record: Record) {
        self.deletes.remove(&record.id);
        self.upserts.insert(record.id.clone(), record);
    }

    pub fn delete(&mut self, id: RecordId) {
        self.upserts.remove(&id);
        self.deletes.insert(id);
    }

    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    Entity(String),
    All,
}

impl FetchRequest {
    pub fn entity(name: impl Into<String>) -> Self {
        FetchRequest::Entity(name.into())
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            FetchRequest::Entity(name) => &record.entity == name,
            FetchRequest::All => true,
        }
    }
}

pub fn sort_records(records: &mut [Record]) {
    records.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
}
