//! Default persistence provider backed by one SQLite file per store.

use crate::core::db;
use crate::core::error::{SaveError, StoreError};
use crate::core::migration;
use crate::core::pool::{self, WriteLocks};
use crate::core::provider::PersistenceProvider;
use crate::core::record::{ChangeSet, FetchRequest, Record, RecordId};
use crate::core::schemas;
use crate::core::store::{StoreDescriptor, StoreHandle, StoreKind, StoreOptions};
use rusqlite::{Connection, Row, params};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Default)]
pub struct SqliteProvider {
    locks: WriteLocks,
}

impl SqliteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_writable(&self, path: &Path, options: &StoreOptions) -> Result<Connection, StoreError> {
        let conn = db::db_connect(path)?;
        migration::check_and_migrate(&conn, options)?;
        Ok(conn)
    }
}

fn read_records(conn: &Connection, request: &FetchRequest) -> Result<Vec<Record>, StoreError> {
    let Some(version) = migration::readable_version(conn)? else {
        return Ok(Vec::new());
    };
    let legacy = version < 2;
    let raw = match request {
        FetchRequest::All => {
            let sql = if legacy { schemas::SELECT_ALL_V1 } else { schemas::SELECT_ALL };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], raw_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        FetchRequest::Entity(entity) => {
            let sql = if legacy {
                schemas::SELECT_ENTITY_V1
            } else {
                schemas::SELECT_ENTITY
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params![entity], raw_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    raw.into_iter().map(RawRecord::decode).collect()
}

struct RawRecord {
    id: String,
    entity: String,
    created_at: i64,
    attributes: String,
    relationships: String,
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        entity: row.get(1)?,
        created_at: row.get(2)?,
        attributes: row.get(3)?,
        relationships: row.get(4)?,
    })
}

impl RawRecord {
    fn decode(self) -> Result<Record, StoreError> {
        let attributes: BTreeMap<String, serde_json::Value> = serde_json::from_str(&self.attributes)?;
        let relationships: BTreeMap<String, Vec<RecordId>> =
            serde_json::from_str(&self.relationships)?;
        Ok(Record {
            id: RecordId::from(self.id),
            entity: self.entity,
            created_at: self.created_at,
            attributes,
            relationships,
        })
    }
}

fn write_record(conn: &Connection, record: &Record) -> Result<(), StoreError> {
    conn.execute(
        schemas::UPSERT_RECORD,
        params![
            record.id.as_str(),
            record.entity,
            record.created_at,
            serde_json::to_string(&record.attributes)?,
            serde_json::to_string(&record.relationships)?,
        ],
    )?;
    Ok(())
}

impl PersistenceProvider for SqliteProvider {
    fn attach(&self, descriptor: &StoreDescriptor) -> Result<StoreHandle, StoreError> {
        let path = descriptor.location();
        if descriptor.options().read_only {
            let conn = db::db_connect_read_only(path)?;
            migration::readable_version(&conn)?;
        } else {
            self.locks
                .with_write(path, || self.open_writable(path, descriptor.options()))?;
        }
        Ok(StoreHandle::new(descriptor.clone()))
    }

    fn migrate(
        &self,
        source: &StoreHandle,
        target: &Path,
        options: &StoreOptions,
    ) -> Result<StoreHandle, StoreError> {
        let records = {
            let conn = if source.is_read_only() {
                db::db_connect_read_only(source.location())?
            } else {
                db::db_connect(source.location())?
            };
            read_records(&conn, &FetchRequest::All)?
        };

        let target_options = StoreOptions {
            read_only: false,
            ..options.clone()
        };
        self.locks.with_write(target, || {
            let mut conn = self.open_writable(target, &target_options)?;
            let tx = conn.transaction()?;
            for record in &records {
                write_record(&tx, record)?;
            }
            tx.commit()?;
            Ok::<_, StoreError>(())
        })?;
        tracing::debug!(
            records = records.len(),
            target = %target.display(),
            "copied records into target store"
        );

        let kind = if target_options.ubiquitous_container_name.is_some() {
            StoreKind::Cloud
        } else {
            source.descriptor.kind()
        };
        Ok(StoreHandle::new(StoreDescriptor::new(
            kind,
            target.to_path_buf(),
            target_options,
        )))
    }

    fn fetch(&self, store: &StoreHandle, request: &FetchRequest) -> Result<Vec<Record>, StoreError> {
        let conn = if store.is_read_only() {
            db::db_connect_read_only(store.location())?
        } else {
            db::db_connect(store.location())?
        };
        read_records(&conn, request)
    }

    fn save(&self, store: &StoreHandle, changes: &ChangeSet) -> Result<(), SaveError> {
        if store.is_read_only() {
            return Err(SaveError::ReadOnly(store.location().to_path_buf()));
        }
        let path = store.location();
        self.locks.with_write(path, || {
            pool::retry_on_busy(|| {
                let mut conn = self.open_writable(path, store.descriptor.options())?;
                let tx = conn.transaction()?;
                for id in &changes.deletes {
                    tx.execute(schemas::DELETE_RECORD, params![id.as_str()])?;
                }
                for record in changes.upserts.values() {
                    write_record(&tx, record)?;
                }
                tx.commit()?;
                Ok(())
            })
        })?;
        Ok(())
    }
}
