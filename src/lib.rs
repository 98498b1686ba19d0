//! seedsync: one-time local→cloud store seeding for embedded apps
//!
//! **An app's object store starts on the device and later moves to the cloud.**
//!
//! The first time cloud sync becomes available, the device-local store is
//! copied into the cloud store exactly once per cloud identity. After that the
//! cloud store is attached directly, and duplicate records introduced by the
//! seed or by later remote merges are resolved by a uniqueness key.
//!
//! # Architecture
//!
//! ## Dual-Store Model
//!
//! - **Local store** (`<base>/local<Model>.sqlite`): device-only, read-only once seeded
//! - **Cloud store** (`<base>/<Model>.sqlite`): synchronized by an external provider
//!
//! ## The Seed Flag
//!
//! A single boolean in a cloud-synchronized key-value record arbitrates
//! whether seeding has happened. It only ever moves false→true, and only after
//! a successful migration.
//!
//! ## Execution contexts
//!
//! - **Background**: the migration itself, on its own thread
//! - **Foreground**: a serial executor owning every mutation of the `Context`
//!
//! # Examples
//!
//! ```no_run
//! use seedsync::core::config::EngineConfig;
//! use seedsync::core::engine::{Collaborators, MigrationEngine};
//! use seedsync::core::identity::StaticIdentity;
//! use seedsync::core::lifecycle::LifecycleNotifier;
//! use seedsync::core::seed::FileKeyValueStore;
//! use seedsync::core::sqlite::SqliteProvider;
//! use seedsync::core::task::SerialQueue;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::new("Favorites").with_base_dir("/tmp/favorites");
//! let deps = Collaborators {
//!     provider: Arc::new(SqliteProvider::new()),
//!     identity: Arc::new(StaticIdentity::signed_in("account-token")),
//!     key_value: Arc::new(FileKeyValueStore::new("/tmp/favorites/kv.json")),
//!     notifier: Arc::new(LifecycleNotifier::new()),
//!     foreground: Arc::new(SerialQueue::new("foreground").unwrap()),
//! };
//! let mut engine = MigrationEngine::initialize(&config, deps).unwrap();
//! if let Some(outcome) = engine.wait_for_seeding() {
//!     println!("seeded: {:?}", outcome.map(|r| r.dedup.records_removed));
//! }
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: store identities, the provider seam, context, seed flag,
//!   lifecycle events, dedup and the migration engine

pub mod core;

pub use crate::core::engine::{Collaborators, EngineState, MigrationEngine};
pub use crate::core::error::{ConfigurationError, DedupError, EngineError, SaveError, StoreError};
