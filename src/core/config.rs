//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! model_name = "Favorites"
//! ubiquitous_name = "FavoritesCloudStore"
//! base_dir = "/var/mobile/Documents"
//!
//! [seed_entity]
//! entity = "Favorite"
//! unique_key = "entryID"
//!
//! [[tracked_entities]]
//! entity = "Favorite"
//! unique_key = "entryID"
//! ```

use crate::core::error::ConfigurationError;
use crate::core::seed::SEED_FLAG_KEY;
use crate::core::store::validate_model_name;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory of `$HOME` used when `base_dir` is not configured.
const DEFAULT_DOCUMENTS_DIR: &str = "Documents";

/// An entity kind and the attribute that identifies one logical record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackedEntity {
    pub entity: String,
    pub unique_key: String,
}

impl TrackedEntity {
    pub fn new(entity: impl Into<String>, unique_key: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            unique_key: unique_key.into(),
        }
    }
}

impl Default for TrackedEntity {
    fn default() -> Self {
        Self::new("Favorite", "entryID")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub model_name: String,
    /// Defaults to `<model_name>CloudStore`.
    #[serde(default)]
    pub ubiquitous_name: Option<String>,
    /// Defaults to `$HOME/Documents`.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default = "default_seed_flag_key")]
    pub seed_flag_key: String,
    /// Entity deduplicated once right after seeding.
    #[serde(default)]
    pub seed_entity: TrackedEntity,
    /// Entities deduplicated after every remote import. Defaults to the seed entity.
    #[serde(default)]
    pub tracked_entities: Vec<TrackedEntity>,
}

fn default_seed_flag_key() -> String {
    SEED_FLAG_KEY.to_string()
}

impl EngineConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ubiquitous_name: None,
            base_dir: None,
            seed_flag_key: default_seed_flag_key(),
            seed_entity: TrackedEntity::default(),
            tracked_entities: Vec::new(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_ubiquitous_name(mut self, name: impl Into<String>) -> Self {
        self.ubiquitous_name = Some(name.into());
        self
    }

    pub fn with_seed_entity(mut self, entity: TrackedEntity) -> Self {
        self.seed_entity = entity;
        self
    }

    pub fn track(mut self, entity: TrackedEntity) -> Self {
        self.tracked_entities.push(entity);
        self
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigurationError> {
        let config: EngineConfig = toml::from_str(input)?;
        validate_model_name(&config.model_name)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn ubiquitous_name(&self) -> String {
        self.ubiquitous_name
            .clone()
            .unwrap_or_else(|| format!("{}CloudStore", self.model_name))
    }

    /// Entities to deduplicate after a remote import.
    pub fn tracked(&self) -> Vec<TrackedEntity> {
        if self.tracked_entities.is_empty() {
            vec![self.seed_entity.clone()]
        } else {
            self.tracked_entities.clone()
        }
    }

    pub fn resolve_base_dir(&self) -> Result<PathBuf, ConfigurationError> {
        if let Some(dir) = &self.base_dir {
            return Ok(dir.clone());
        }
        let home = env::var("HOME")?;
        if home.trim().is_empty() {
            return Err(ConfigurationError::MissingBaseDirectory(
                "HOME is empty".to_string(),
            ));
        }
        Ok(PathBuf::from(home).join(DEFAULT_DOCUMENTS_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = EngineConfig::from_toml_str("model_name = \"Favorites\"").unwrap();
        assert_eq!(config.seed_flag_key, SEED_FLAG_KEY);
        assert_eq!(config.ubiquitous_name(), "FavoritesCloudStore");
        assert_eq!(config.seed_entity, TrackedEntity::new("Favorite", "entryID"));
        assert_eq!(config.tracked(), vec![TrackedEntity::new("Favorite", "entryID")]);
    }

    #[test]
    fn test_full_config_parses() {
        let config = EngineConfig::from_toml_str(
            r#"
            model_name = "Notes"
            ubiquitous_name = "NotesSync"
            base_dir = "/tmp/notes"
            seed_flag_key = "NOTES_SEEDED"

            [seed_entity]
            entity = "Note"
            unique_key = "uuid"

            [[tracked_entities]]
            entity = "Note"
            unique_key = "uuid"

            [[tracked_entities]]
            entity = "Tag"
            unique_key = "name"
            "#,
        )
        .unwrap();
        assert_eq!(config.ubiquitous_name(), "NotesSync");
        assert_eq!(config.resolve_base_dir().unwrap(), PathBuf::from("/tmp/notes"));
        assert_eq!(config.tracked().len(), 2);
        assert_eq!(config.seed_entity.unique_key, "uuid");
    }

    #[test]
    fn test_invalid_config_is_configuration_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("model_name = \"a/b\""),
            Err(ConfigurationError::InvalidModelName(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("model = 1"),
            Err(ConfigurationError::TomlError(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            EngineConfig::load(&tmp.path().join("missing.toml")),
            Err(ConfigurationError::IoError(_))
        ));
    }
}
