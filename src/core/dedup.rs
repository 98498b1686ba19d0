//! Duplicate resolution after a seed or a remote merge.
//!
//! Records of one entity kind that share a uniqueness-key value are one
//! logical record. The earliest by `(created_at, id)` is kept; every other
//! member of the group has its inbound relationships moved to the kept record
//! and is then deleted. A group either resolves completely or not at all.

use crate::core::context::{Checkpoint, Context};
use crate::core::error::{DedupError, SaveError, StoreError};
use crate::core::record::{FetchRequest, Record, RecordId};
use rustc_hash::FxHashMap;
use serde_json::Value;

/// What a dedup pass needs from a working set.
pub trait RecordSet {
    type Checkpoint;

    fn fetch(&mut self, request: &FetchRequest) -> Result<Vec<Record>, StoreError>;
    fn update(&mut self, record: Record) -> Result<(), StoreError>;
    fn delete(&mut self, id: &RecordId) -> Result<(), StoreError>;
    fn checkpoint(&self) -> Self::Checkpoint;
    fn rollback(&mut self, checkpoint: Self::Checkpoint);
    fn save(&mut self) -> Result<(), SaveError>;
}

impl RecordSet for Context {
    type Checkpoint = Checkpoint;

    fn fetch(&mut self, request: &FetchRequest) -> Result<Vec<Record>, StoreError> {
        Context::fetch(self, request)
    }

    fn update(&mut self, record: Record) -> Result<(), StoreError> {
        Context::update(self, record)
    }

    fn delete(&mut self, id: &RecordId) -> Result<(), StoreError> {
        Context::delete(self, id)
    }

    fn checkpoint(&self) -> Checkpoint {
        Context::checkpoint(self)
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        Context::rollback(self, checkpoint)
    }

    fn save(&mut self) -> Result<(), SaveError> {
        Context::save(self)
    }
}

/// Records of one kind sharing one key value. `keep` is the earliest member.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub key: Value,
    pub keep: Record,
    pub duplicates: Vec<Record>,
}

#[derive(Debug, Default)]
pub struct DedupReport {
    pub entity: String,
    pub scanned: usize,
    pub groups_resolved: usize,
    pub records_removed: usize,
    pub relationships_repointed: usize,
    pub failures: Vec<DedupError>,
    pub save_error: Option<SaveError>,
}

impl DedupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.save_error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduplicator {
    entity: String,
    unique_attribute: String,
}

impl Deduplicator {
    pub fn new(entity: impl Into<String>, unique_attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            unique_attribute: unique_attribute.into(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn unique_attribute(&self) -> &str {
        &self.unique_attribute
    }

    /// Groups of size > 1, in order of each group's earliest record. Records
    /// without the attribute (or with `null`) are not grouped.
    pub fn find_groups(&self, records: Vec<Record>) -> Vec<DuplicateGroup> {
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        let mut members: Vec<(Value, Vec<Record>)> = Vec::new();
        for record in records {
            let Some(value) = record.attribute(&self.unique_attribute) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let key = value.to_string();
            match index.get(&key) {
                Some(&slot) => members[slot].1.push(record),
                None => {
                    index.insert(key, members.len());
                    members.push((value.clone(), vec![record]));
                }
            }
        }

        members
            .into_iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(key, mut group)| {
                crate::core::record::sort_records(&mut group);
                let keep = group.remove(0);
                DuplicateGroup {
                    key,
                    keep,
                    duplicates: group,
                }
            })
            .collect()
    }

    /// One full pass: resolve every group, then save.
    ///
    /// Per-group failures roll that group back and are collected in the
    /// report; a fetch failure ends the pass early. Nothing here is fatal.
    pub fn run<S: RecordSet>(&self, set: &mut S) -> DedupReport {
        let mut report = DedupReport {
            entity: self.entity.clone(),
            ..DedupReport::default()
        };

        let candidates = match set.fetch(&FetchRequest::entity(self.entity.clone())) {
            Ok(records) => records,
            Err(source) => {
                report.failures.push(self.failure("*", source));
                tracing::warn!(entity = %self.entity, error = %report.failures[0], "dedup fetch failed");
                return report;
            }
        };
        report.scanned = candidates.len();

        let groups = self.find_groups(candidates);
        if groups.is_empty() {
            tracing::debug!(entity = %self.entity, scanned = report.scanned, "no duplicates");
            return report;
        }

        for group in &groups {
            let checkpoint = set.checkpoint();
            match self.resolve_group(set, group) {
                Ok(repointed) => {
                    report.groups_resolved += 1;
                    report.records_removed += group.duplicates.len();
                    report.relationships_repointed += repointed;
                }
                Err(source) => {
                    set.rollback(checkpoint);
                    let error = self.failure(&group.key.to_string(), source);
                    tracing::warn!(entity = %self.entity, %error, "duplicate group rolled back");
                    report.failures.push(error);
                }
            }
        }

        if let Err(error) = set.save() {
            tracing::error!(entity = %self.entity, %error, "saving dedup pass failed");
            report.save_error = Some(error);
        }

        tracing::info!(
            entity = %self.entity,
            key = %self.unique_attribute,
            groups = report.groups_resolved,
            removed = report.records_removed,
            failed = report.failures.len(),
            "dedup pass finished"
        );
        report
    }

    fn resolve_group<S: RecordSet>(
        &self,
        set: &mut S,
        group: &DuplicateGroup,
    ) -> Result<usize, StoreError> {
        // Fetched fresh so earlier groups' re-pointing is visible.
        let everything = set.fetch(&FetchRequest::All)?;
        let mut repointed = 0;
        for mut owner in everything {
            let mut changed = false;
            for duplicate in &group.duplicates {
                if owner.id == duplicate.id {
                    continue;
                }
                changed |= owner.repoint(&duplicate.id, &group.keep.id);
            }
            if changed && !group.duplicates.iter().any(|d| d.id == owner.id) {
                set.update(owner)?;
                repointed += 1;
            }
        }
        for duplicate in &group.duplicates {
            set.delete(&duplicate.id)?;
        }
        Ok(repointed)
    }

    fn failure(&self, key: &str, source: StoreError) -> DedupError {
        DedupError {
            entity: self.entity.clone(),
            attribute: self.unique_attribute.clone(),
            key: key.to_string(),
            source,
        }
    }
}
