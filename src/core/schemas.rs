//! SQL schema for a record store.
//!
//! Every store (local or cloud) has the same single table. `PRAGMA user_version`
//! carries the schema version; `migration` brings older stores forward.

/// Version a freshly created or fully migrated store is at.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

pub const RECORDS_SCHEMA_V1: &str = "
    CREATE TABLE IF NOT EXISTS records (
        id TEXT PRIMARY KEY,
        entity TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        attributes TEXT NOT NULL
    )
";

pub const RECORDS_ADD_RELATIONSHIPS: &str =
    "ALTER TABLE records ADD COLUMN relationships TEXT NOT NULL DEFAULT '{}'";

pub const RECORDS_INDEX_ENTITY_ORDER: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_entity_order ON records(entity, created_at, id)";

pub const UPSERT_RECORD: &str = "
    INSERT INTO records (id, entity, created_at, attributes, relationships)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(id) DO UPDATE SET
        entity = excluded.entity,
        created_at = excluded.created_at,
        attributes = excluded.attributes,
        relationships = excluded.relationships
";

pub const DELETE_RECORD: &str = "DELETE FROM records WHERE id = ?1";

pub const SELECT_ALL: &str =
    "SELECT id, entity, created_at, attributes, relationships FROM records ORDER BY created_at, id";

pub const SELECT_ENTITY: &str = "SELECT id, entity, created_at, attributes, relationships FROM records WHERE entity = ?1 ORDER BY created_at, id";

/// Version 1 stores have no relationships column.
pub const SELECT_ALL_V1: &str =
    "SELECT id, entity, created_at, attributes, '{}' FROM records ORDER BY created_at, id";

pub const SELECT_ENTITY_V1: &str = "SELECT id, entity, created_at, attributes, '{}' FROM records WHERE entity = ?1 ORDER BY created_at, id";
