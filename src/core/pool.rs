//! Per-store write serialization with busy retry.
//!
//! Connections are NOT pooled (opened fresh each time). What is shared is a
//! write mutex per store path, so two writers in this process never contend on
//! the SQLite lock; contention from other processes is absorbed by
//! `busy_timeout` plus `retry_on_busy`.

use crate::core::error::StoreError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Maximum retry attempts for busy/locked errors.
const MAX_RETRIES: u32 = 5;
/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 50;
/// Maximum delay cap (milliseconds).
const MAX_DELAY_MS: u64 = 2_000;

#[derive(Default)]
pub struct WriteLocks {
    entries: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl WriteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, db_path: &Path) -> Arc<Mutex<()>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .entry(db_path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `f` while holding the write lock for `db_path`.
    pub fn with_write<F, R, E>(&self, db_path: &Path, f: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
    {
        let entry = self.entry(db_path);
        let _guard = entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }
}

/// Retry a closure on `SQLITE_BUSY` / `SQLITE_LOCKED` with exponential backoff.
pub fn retry_on_busy<F, R>(mut f: F) -> Result<R, StoreError>
where
    F: FnMut() -> Result<R, StoreError>,
{
    let mut attempt = 0u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if is_busy_error(&e) && attempt < MAX_RETRIES => {
                attempt += 1;
                let delay_ms = (BASE_DELAY_MS * 2u64.pow(attempt - 1)).min(MAX_DELAY_MS);
                tracing::debug!(attempt, delay_ms, "store busy, retrying");
                thread::sleep(Duration::from_millis(delay_ms));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check if an error is a SQLite busy/locked error that is retryable.
pub fn is_busy_error(err: &StoreError) -> bool {
    match err {
        StoreError::RusqliteError(rusqlite::Error::SqliteFailure(code, _)) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_gives_up_on_non_busy_error() {
        let mut calls = 0;
        let result: Result<(), StoreError> = retry_on_busy(|| {
            calls += 1;
            Err(StoreError::NotAttached)
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_retry_recovers_after_busy() {
        let mut calls = 0;
        let result = retry_on_busy(|| {
            calls += 1;
            if calls < 3 {
                Err(StoreError::RusqliteError(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                    None,
                )))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_same_path_shares_lock() {
        let locks = WriteLocks::new();
        let a = locks.entry(Path::new("/tmp/a.sqlite"));
        let b = locks.entry(Path::new("/tmp/a.sqlite"));
        assert!(Arc::ptr_eq(&a, &b));
    }
}
