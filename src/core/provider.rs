//! Persistence provider seam and the coordinator-level store attachment.

use crate::core::error::{SaveError, StoreError};
use crate::core::record::{ChangeSet, FetchRequest, Record};
use crate::core::store::{StoreDescriptor, StoreHandle, StoreOptions};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Opens, migrates, reads and writes named stores.
///
/// Implementations must be thread-safe: the seeding task drives a provider
/// from a background thread while the context uses it from the foreground.
pub trait PersistenceProvider: Send + Sync {
    fn attach(&self, descriptor: &StoreDescriptor) -> Result<StoreHandle, StoreError>;

    /// Copies every record of `source` into a store at `target`, created if
    /// absent, opened with `options`. The source is left on disk.
    fn migrate(
        &self,
        source: &StoreHandle,
        target: &Path,
        options: &StoreOptions,
    ) -> Result<StoreHandle, StoreError>;

    /// Records matching `request`, ordered by `(created_at, id)`.
    fn fetch(&self, store: &StoreHandle, request: &FetchRequest)
    -> Result<Vec<Record>, StoreError>;

    fn save(&self, store: &StoreHandle, changes: &ChangeSet) -> Result<(), SaveError>;

    /// Drops any provider-side cache for `store`.
    fn reset(&self, _store: &StoreHandle) {}
}

/// Holds the single store attached for a context.
///
/// Attachment lives here rather than in the context so the seeding task can
/// attach and migrate without touching the foreground context.
pub struct Coordinator {
    provider: Arc<dyn PersistenceProvider>,
    attached: Mutex<Option<StoreHandle>>,
}

impl Coordinator {
    pub fn new(provider: Arc<dyn PersistenceProvider>) -> Self {
        Self {
            provider,
            attached: Mutex::new(None),
        }
    }

    pub fn provider(&self) -> &Arc<dyn PersistenceProvider> {
        &self.provider
    }

    fn slot(&self) -> MutexGuard<'_, Option<StoreHandle>> {
        self.attached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn attach(&self, descriptor: &StoreDescriptor) -> Result<StoreHandle, StoreError> {
        let mut slot = self.slot();
        if let Some(existing) = slot.as_ref() {
            return Err(StoreError::AlreadyAttached(existing.location().to_path_buf()));
        }
        let handle = self.provider.attach(descriptor)?;
        tracing::info!(
            store = %handle.location().display(),
            kind = ?descriptor.kind(),
            read_only = handle.is_read_only(),
            "attached store"
        );
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Migrates the attached store to `target` and attaches the result in its
    /// place. On failure the original store stays attached.
    ///
    /// The slot is not held while the provider copies data, so the context
    /// keeps working against the source store meanwhile. If the attachment
    /// changed under the copy, the result is not attached.
    pub fn migrate(&self, target: &Path, options: &StoreOptions) -> Result<StoreHandle, StoreError> {
        let source = self.current()?;
        let migrated = self.provider.migrate(&source, target, options)?;

        let mut slot = self.slot();
        if slot.as_ref().map(|current| current.id.as_str()) != Some(source.id.as_str()) {
            tracing::warn!(
                from = %source.location().display(),
                to = %migrated.location().display(),
                "attachment changed during migration; result not attached"
            );
            return Err(StoreError::AttachmentChanged(source.location().to_path_buf()));
        }
        tracing::info!(
            from = %source.location().display(),
            to = %migrated.location().display(),
            "migrated store"
        );
        *slot = Some(migrated.clone());
        Ok(migrated)
    }

    pub fn detach(&self) -> Option<StoreHandle> {
        self.slot().take()
    }

    pub fn current(&self) -> Result<StoreHandle, StoreError> {
        self.slot().clone().ok_or(StoreError::NotAttached)
    }
}
