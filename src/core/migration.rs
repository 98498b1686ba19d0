//! Schema versioning for record stores.
//!
//! - **Version tracking**: `PRAGMA user_version` holds the store's schema version
//! - **Ordered steps**: each step moves a store to exactly one higher version
//! - **Option gated**: existing stores are only upgraded with `auto_migrate_schema`;
//!   steps marked `inferred` also need `infer_mapping`
//! - **Idempotent**: every step is safe to run on a store that already has it

use crate::core::db;
use crate::core::error::StoreError;
use crate::core::schemas;
use crate::core::store::StoreOptions;
use rusqlite::Connection;

/// Schema step definition
pub struct SchemaStep {
    /// Version the store is at after this step
    pub target_version: u32,
    pub description: &'static str,
    /// Step derives its mapping from the model diff rather than an explicit mapping
    pub inferred: bool,
    pub up: fn(&Connection) -> Result<(), StoreError>,
}

/// All steps in order
pub fn all_steps() -> Vec<SchemaStep> {
    vec![
        SchemaStep {
            target_version: 1,
            description: "Create records table",
            inferred: false,
            up: create_records_table,
        },
        SchemaStep {
            target_version: 2,
            description: "Add relationships column and entity ordering index",
            inferred: true,
            up: add_relationships,
        },
    ]
}

/// Brings a writable store to the current schema version.
///
/// A fresh store (version 0, no table) is always initialized. An existing
/// store below the current version is only upgraded when the options allow it.
pub fn check_and_migrate(conn: &Connection, options: &StoreOptions) -> Result<u32, StoreError> {
    let stored = db::user_version(conn)?;
    if stored == schemas::CURRENT_SCHEMA_VERSION {
        return Ok(stored);
    }
    if stored > schemas::CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew(stored));
    }

    let fresh = stored == 0 && !has_records_table(conn)?;
    if !fresh && !options.auto_migrate_schema {
        return Err(StoreError::SchemaOutdated {
            found: stored,
            expected: schemas::CURRENT_SCHEMA_VERSION,
        });
    }

    let mut applied = 0;
    for step in all_steps() {
        if step.target_version <= stored {
            continue;
        }
        if step.inferred && !fresh && !options.infer_mapping {
            return Err(StoreError::MappingRequired(step.target_version));
        }
        tracing::debug!(version = step.target_version, "{}", step.description);
        (step.up)(conn)?;
        db::set_user_version(conn, step.target_version)?;
        applied += 1;
    }

    if !fresh {
        tracing::info!(
            from = stored,
            to = schemas::CURRENT_SCHEMA_VERSION,
            applied,
            "upgraded store schema"
        );
    }
    Ok(schemas::CURRENT_SCHEMA_VERSION)
}

/// Schema version to read with; `None` means the store holds no table yet.
pub fn readable_version(conn: &Connection) -> Result<Option<u32>, StoreError> {
    let stored = db::user_version(conn)?;
    if stored > schemas::CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew(stored));
    }
    if !has_records_table(conn)? {
        return Ok(None);
    }
    Ok(Some(stored.max(1)))
}

fn has_records_table(conn: &Connection) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='records'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn create_records_table(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(schemas::RECORDS_SCHEMA_V1)?;
    Ok(())
}

fn add_relationships(conn: &Connection) -> Result<(), StoreError> {
    let has_column: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('records') WHERE name='relationships'",
        [],
        |row| row.get(0),
    )?;
    if has_column == 0 {
        conn.execute_batch(schemas::RECORDS_ADD_RELATIONSHIPS)?;
    }
    conn.execute_batch(schemas::RECORDS_INDEX_ENTITY_ORDER)?;
    Ok(())
}
