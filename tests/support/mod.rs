#![allow(dead_code)]

use seedsync::core::config::EngineConfig;
use seedsync::core::context::Context;
use seedsync::core::engine::Collaborators;
use seedsync::core::error::{SaveError, StoreError};
use seedsync::core::identity::StaticIdentity;
use seedsync::core::lifecycle::LifecycleNotifier;
use seedsync::core::provider::{Coordinator, PersistenceProvider};
use seedsync::core::record::{ChangeSet, FetchRequest, Record};
use seedsync::core::seed::{KeyValueStore, MemoryKeyValueStore};
use seedsync::core::sqlite::SqliteProvider;
use seedsync::core::store::{StoreDescriptor, StoreHandle, StoreLocator, StoreOptions};
use seedsync::core::task::SerialQueue;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::{Duration, Instant};

/// Ordered log of calls across collaborators.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// SQLite provider that journals every call and can be told to fail saves,
/// slow down migrations, or hold them at a barrier.
pub struct RecordingProvider {
    inner: SqliteProvider,
    journal: Journal,
    pub fail_saves: AtomicBool,
    pub fail_migrations: AtomicBool,
    migrate_delay: Mutex<Duration>,
    migrate_gate: Mutex<Option<Arc<Barrier>>>,
}

impl RecordingProvider {
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: SqliteProvider::new(),
            journal,
            fail_saves: AtomicBool::new(false),
            fail_migrations: AtomicBool::new(false),
            migrate_delay: Mutex::new(Duration::ZERO),
            migrate_gate: Mutex::new(None),
        }
    }

    pub fn slow_migrations(&self, delay: Duration) {
        *self.migrate_delay.lock().unwrap() = delay;
    }

    /// Every migration waits at `gate` before copying.
    pub fn gate_migrations(&self, gate: Arc<Barrier>) {
        *self.migrate_gate.lock().unwrap() = Some(gate);
    }
}

impl PersistenceProvider for RecordingProvider {
    fn attach(&self, descriptor: &StoreDescriptor) -> Result<StoreHandle, StoreError> {
        self.journal.push(format!("attach:{:?}", descriptor.kind()));
        self.inner.attach(descriptor)
    }

    fn migrate(
        &self,
        source: &StoreHandle,
        target: &Path,
        options: &StoreOptions,
    ) -> Result<StoreHandle, StoreError> {
        self.journal.push("migrate");
        let gate = self.migrate_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait();
        }
        let delay = *self.migrate_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.fail_migrations.load(Ordering::SeqCst) {
            return Err(StoreError::IoError(std::io::Error::other("injected migrate failure")));
        }
        self.inner.migrate(source, target, options)
    }

    fn fetch(&self, store: &StoreHandle, request: &FetchRequest) -> Result<Vec<Record>, StoreError> {
        match request {
            FetchRequest::Entity(name) => self.journal.push(format!("fetch:{name}")),
            FetchRequest::All => self.journal.push("fetch:*"),
        }
        self.inner.fetch(store, request)
    }

    fn save(&self, store: &StoreHandle, changes: &ChangeSet) -> Result<(), SaveError> {
        self.journal.push("save");
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SaveError::Store(StoreError::IoError(std::io::Error::other(
                "injected save failure",
            ))));
        }
        self.inner.save(store, changes)
    }

    fn reset(&self, store: &StoreHandle) {
        self.journal.push("reset");
        self.inner.reset(store);
    }
}

/// Shared in-memory key-value record that journals access. With `drop_writes`
/// it behaves like a process killed before the write landed.
#[derive(Clone)]
pub struct RecordingKv {
    inner: MemoryKeyValueStore,
    journal: Journal,
    drop_writes: Arc<AtomicBool>,
}

impl RecordingKv {
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: MemoryKeyValueStore::new(),
            journal,
            drop_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn drop_writes(&self, drop: bool) {
        self.drop_writes.store(drop, Ordering::SeqCst);
    }
}

impl KeyValueStore for RecordingKv {
    fn bool_for_key(&self, key: &str) -> bool {
        self.journal.push(format!("kv.get:{key}"));
        self.inner.bool_for_key(key)
    }

    fn set_bool(&self, key: &str, value: bool) -> bool {
        self.journal.push(format!("kv.set:{key}={value}"));
        if !self.drop_writes.load(Ordering::SeqCst) {
            self.inner.set_bool(key, value);
        }
        // A killed process never learns the write was lost.
        true
    }
}

pub struct Harness {
    pub journal: Journal,
    pub provider: Arc<RecordingProvider>,
    pub kv: RecordingKv,
    pub identity: Arc<StaticIdentity>,
    pub notifier: Arc<LifecycleNotifier>,
    pub foreground: Arc<SerialQueue>,
}

impl Harness {
    pub fn new(signed_in: bool) -> Self {
        let journal = Journal::default();
        Self {
            provider: Arc::new(RecordingProvider::new(journal.clone())),
            kv: RecordingKv::new(journal.clone()),
            identity: Arc::new(if signed_in {
                StaticIdentity::signed_in("account-1")
            } else {
                StaticIdentity::signed_out()
            }),
            notifier: Arc::new(LifecycleNotifier::new()),
            foreground: Arc::new(SerialQueue::new("test-foreground").unwrap()),
            journal,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            provider: self.provider.clone(),
            identity: self.identity.clone(),
            key_value: Arc::new(self.kv.clone()),
            notifier: self.notifier.clone(),
            foreground: self.foreground.clone(),
        }
    }
}

/// Polls `done` until it holds or five seconds pass.
pub fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

pub fn config(base: &Path) -> EngineConfig {
    EngineConfig::new("Favorites").with_base_dir(base)
}

pub fn favorite(entry_id: i64, created_at: i64) -> Record {
    Record::new("Favorite")
        .with_created_at(created_at)
        .with_attribute("entryID", entry_id)
}

/// Writes `records` into the local store for `Favorites` under `base`.
pub fn write_local_store(base: &Path, records: Vec<Record>) {
    let pair = StoreLocator::new("Favorites", "FavoritesCloudStore")
        .resolve(base)
        .unwrap();
    let coordinator = Arc::new(Coordinator::new(Arc::new(SqliteProvider::new())));
    coordinator.attach(&pair.local.without_options()).unwrap();
    let mut context = Context::new(coordinator);
    for record in records {
        context.insert(record);
    }
    context.save().unwrap();
}

pub fn read_store(location: &Path, entity: &str) -> Vec<Record> {
    let provider = SqliteProvider::new();
    let descriptor = StoreDescriptor::new(
        seedsync::core::store::StoreKind::Cloud,
        location.to_path_buf(),
        StoreOptions {
            auto_migrate_schema: true,
            infer_mapping: true,
            ..StoreOptions::default()
        },
    );
    let handle = provider.attach(&descriptor).unwrap();
    provider.fetch(&handle, &FetchRequest::entity(entity)).unwrap()
}
