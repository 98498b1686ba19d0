//! Store identities for the dual-store layout.
//!
//! An installation has two stores for one model:
//! - `Local`: confined to this device, at `<base>/local<Model>.sqlite`
//! - `Cloud`: synchronized across the user's devices, at `<base>/<Model>.sqlite`

use crate::core::error::ConfigurationError;
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// Store type discriminator for the dual-store layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Device-only store
    Local,
    /// Cloud-synchronized store
    Cloud,
}

/// Named flags applied when a store is attached or migrated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub read_only: bool,
    pub auto_migrate_schema: bool,
    pub infer_mapping: bool,
    /// Container the sync provider uses for this store's transaction logs.
    pub ubiquitous_container_name: Option<String>,
}

/// Where a store lives and how to open it. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDescriptor {
    kind: StoreKind,
    location: PathBuf,
    options: StoreOptions,
}

impl StoreDescriptor {
    pub fn new(kind: StoreKind, location: PathBuf, options: StoreOptions) -> Self {
        Self {
            kind,
            location,
            options,
        }
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn exists(&self) -> bool {
        self.location.is_file()
    }

    /// Same store, opened without any options. Used when the local store is
    /// still authoritative (no cloud identity).
    pub fn without_options(&self) -> Self {
        Self {
            kind: self.kind,
            location: self.location.clone(),
            options: StoreOptions::default(),
        }
    }
}

/// An attached store, as returned by a persistence provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    pub id: String,
    pub descriptor: StoreDescriptor,
}

impl StoreHandle {
    pub fn new(descriptor: StoreDescriptor) -> Self {
        Self {
            id: Ulid::new().to_string(),
            descriptor,
        }
    }

    pub fn location(&self) -> &Path {
        self.descriptor.location()
    }

    pub fn is_read_only(&self) -> bool {
        self.descriptor.options().read_only
    }
}

/// The local and cloud descriptors for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePair {
    pub local: StoreDescriptor,
    pub cloud: StoreDescriptor,
}

/// Resolves the on-disk identity of both stores for a model.
#[derive(Debug, Clone)]
pub struct StoreLocator {
    model_name: String,
    ubiquitous_name: String,
}

impl StoreLocator {
    pub fn new(model_name: impl Into<String>, ubiquitous_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ubiquitous_name: ubiquitous_name.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Pure function of its inputs; touches nothing on disk except to check the
    /// base directory is usable.
    ///
    /// The local descriptor is read-only: it is only ever attached with its
    /// options as the seeding source, after which it is no longer
    /// authoritative. The cloud descriptor always carries automatic schema
    /// migration and mapping inference because the synced schema may lag the
    /// shipped model.
    pub fn resolve(&self, base_dir: &Path) -> Result<StorePair, ConfigurationError> {
        validate_model_name(&self.model_name)?;
        if base_dir.as_os_str().is_empty() {
            return Err(ConfigurationError::MissingBaseDirectory(
                "empty path".to_string(),
            ));
        }
        if base_dir.exists() && !base_dir.is_dir() {
            return Err(ConfigurationError::MissingBaseDirectory(format!(
                "{} is not a directory",
                base_dir.display()
            )));
        }

        let local = StoreDescriptor::new(
            StoreKind::Local,
            base_dir.join(format!("local{}.sqlite", self.model_name)),
            StoreOptions {
                read_only: true,
                ..StoreOptions::default()
            },
        );
        let cloud = StoreDescriptor::new(
            StoreKind::Cloud,
            base_dir.join(format!("{}.sqlite", self.model_name)),
            StoreOptions {
                read_only: false,
                auto_migrate_schema: true,
                infer_mapping: true,
                ubiquitous_container_name: Some(self.ubiquitous_name.clone()),
            },
        );
        Ok(StorePair { local, cloud })
    }
}

pub(crate) fn validate_model_name(name: &str) -> Result<(), ConfigurationError> {
    let invalid = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == "..";
    if invalid {
        return Err(ConfigurationError::InvalidModelName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_layout_and_options() {
        let tmp = tempfile::tempdir().unwrap();
        let pair = StoreLocator::new("Favorites", "FavoritesCloud")
            .resolve(tmp.path())
            .unwrap();

        assert_eq!(pair.local.kind(), StoreKind::Local);
        assert_eq!(pair.local.location(), tmp.path().join("localFavorites.sqlite"));
        assert!(pair.local.options().read_only);
        assert!(!pair.local.options().auto_migrate_schema);

        assert_eq!(pair.cloud.kind(), StoreKind::Cloud);
        assert_eq!(pair.cloud.location(), tmp.path().join("Favorites.sqlite"));
        let cloud = pair.cloud.options();
        assert!(cloud.auto_migrate_schema && cloud.infer_mapping && !cloud.read_only);
        assert_eq!(cloud.ubiquitous_container_name.as_deref(), Some("FavoritesCloud"));
    }

    #[test]
    fn test_resolve_is_pure() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = StoreLocator::new("M", "U");
        assert_eq!(locator.resolve(tmp.path()).unwrap(), locator.resolve(tmp.path()).unwrap());
        assert!(!locator.resolve(tmp.path()).unwrap().local.exists());
    }

    #[test]
    fn test_resolve_rejects_file_as_base_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        let err = StoreLocator::new("M", "U").resolve(&file).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingBaseDirectory(_)));
    }

    #[test]
    fn test_resolve_rejects_bad_model_names() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["", "  ", "a/b", ".."] {
            let err = StoreLocator::new(name, "U").resolve(tmp.path()).unwrap_err();
            assert!(matches!(err, ConfigurationError::InvalidModelName(_)), "{name}");
        }
    }

    #[test]
    fn test_without_options_drops_read_only() {
        let tmp = tempfile::tempdir().unwrap();
        let pair = StoreLocator::new("M", "U").resolve(tmp.path()).unwrap();
        let writable = pair.local.without_options();
        assert!(!writable.options().read_only);
        assert_eq!(writable.location(), pair.local.location());
    }
}
