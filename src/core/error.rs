use crate::core::record::RecordId;
use std::env;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Missing or malformed install-time configuration. Nothing can run without it.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Base directory could not be resolved: {0}")]
    MissingBaseDirectory(String),
    #[error("Invalid model name: {0:?}")]
    InvalidModelName(String),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Attach or migrate failure. Fatal for the current run only; never persisted.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Store not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Store schema is at version {found}, expected {expected}")]
    SchemaOutdated { found: u32, expected: u32 },
    #[error("Schema step to version {0} needs inferred mapping, which is disabled")]
    MappingRequired(u32),
    #[error("Store schema version {0} is newer than this build supports")]
    SchemaTooNew(u32),
    #[error("A store is already attached: {}", .0.display())]
    AlreadyAttached(PathBuf),
    #[error("No store is attached")]
    NotAttached,
    #[error("Unknown record: {0}")]
    UnknownRecord(RecordId),
    #[error("Attached store changed while migrating from {}", .0.display())]
    AttachmentChanged(PathBuf),
}

/// Context save failure. Recoverable: logged, staged changes may be lost.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Cannot save into read-only store: {}", .0.display())]
    ReadOnly(PathBuf),
    #[error("Store error during save: {0}")]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for SaveError {
    fn from(err: rusqlite::Error) -> Self {
        SaveError::Store(StoreError::RusqliteError(err))
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(err: serde_json::Error) -> Self {
        SaveError::Store(StoreError::SerdeError(err))
    }
}

/// Failure isolated to one duplicate group; other groups are still processed.
#[derive(Error, Debug)]
#[error("Dedup of {entity}.{attribute} = {key} aborted: {source}")]
pub struct DedupError {
    pub entity: String,
    pub attribute: String,
    pub key: String,
    #[source]
    pub source: StoreError,
}

/// Errors surfaced synchronously from engine startup.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
