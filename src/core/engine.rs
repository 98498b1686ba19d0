//! Startup decision, one-time local→cloud seeding, and lifecycle handling.
//!
//! ```text
//! Uninitialized → Deciding ─┬─ no identity ──────────────→ AttachedLocalOnly
//!                           ├─ unseeded + local exists ──→ Seeding → AttachedCloud
//!                           │                                     ↘ Failed
//!                           └─ otherwise ────────────────→ AttachedCloudDirect
//! ```
//!
//! The decision is taken once per engine. Seeding runs on a background thread
//! and hands off to the foreground executor for the post-seed dedup pass. The
//! seed flag only advances after a successful migration, so any failure or
//! crash before that point re-decides from scratch on the next launch.

use crate::core::config::{EngineConfig, TrackedEntity};
use crate::core::context::Context;
use crate::core::dedup::{DedupReport, Deduplicator};
use crate::core::error::{EngineError, SaveError, StoreError};
use crate::core::identity::CloudIdentity;
use crate::core::lifecycle::{LifecycleEvent, LifecycleNotifier, SubscriptionId};
use crate::core::provider::{Coordinator, PersistenceProvider};
use crate::core::seed::{KeyValueStore, SeedFlagStore};
use crate::core::store::{StoreHandle, StoreLocator, StorePair};
use crate::core::task::{self, Completion, Executor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Deciding,
    /// No cloud identity; the local store is authoritative for this run.
    AttachedLocalOnly,
    Seeding,
    /// Seeded during this run.
    AttachedCloud,
    /// Already seeded, or nothing local to seed.
    AttachedCloudDirect,
    /// Seeding failed; the flag was not advanced.
    Failed(String),
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            EngineState::Uninitialized | EngineState::Deciding | EngineState::Seeding
        )
    }
}

/// Everything the engine talks to, injected by the host.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn PersistenceProvider>,
    pub identity: Arc<dyn CloudIdentity>,
    pub key_value: Arc<dyn KeyValueStore>,
    pub notifier: Arc<LifecycleNotifier>,
    pub foreground: Arc<dyn Executor>,
}

#[derive(Debug)]
pub struct SeedReport {
    pub cloud_store: StoreHandle,
    pub dedup: DedupReport,
}

pub type SeedOutcome = Result<SeedReport, StoreError>;

struct Shared {
    context: Mutex<Context>,
    state: Mutex<EngineState>,
    ready: AtomicBool,
    tracked: Vec<TrackedEntity>,
    foreground: Arc<dyn Executor>,
}

impl Shared {
    fn context(&self) -> MutexGuard<'_, Context> {
        self.context.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn state(&self) -> EngineState {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn transition(&self, next: EngineState) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        tracing::info!(from = ?*state, to = ?next, "engine state");
        *state = next;
    }

    fn stores_will_change(&self) {
        self.ready.store(false, Ordering::SeqCst);
        let mut context = self.context();
        if context.has_changes() {
            if let Err(error) = context.save() {
                tracing::error!(%error, "saving before store change failed; staged changes dropped");
            }
        }
        context.reset();
    }

    fn stores_did_change(&self) {
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("store ready");
    }

    fn did_import_remote_changes(self: &Arc<Self>) {
        for tracked in &self.tracked {
            let shared = Arc::clone(self);
            let dedup = Deduplicator::new(tracked.entity.clone(), tracked.unique_key.clone());
            self.foreground.dispatch(Box::new(move || {
                let mut context = shared.context();
                dedup.run(&mut *context);
            }));
        }
    }
}

pub struct MigrationEngine {
    shared: Arc<Shared>,
    coordinator: Arc<Coordinator>,
    notifier: Arc<LifecycleNotifier>,
    subscription: Option<SubscriptionId>,
    stores: StorePair,
    seeding: Option<Completion<SeedOutcome>>,
}

impl MigrationEngine {
    /// Resolves both stores, subscribes to lifecycle events and takes the
    /// startup decision. Returns once a store is attached, or once seeding has
    /// been started in the background.
    ///
    /// Configuration errors and synchronous attach errors are returned and
    /// leave nothing subscribed.
    pub fn initialize(config: &EngineConfig, deps: Collaborators) -> Result<Self, EngineError> {
        let base_dir = config.resolve_base_dir()?;
        let stores = StoreLocator::new(config.model_name.clone(), config.ubiquitous_name())
            .resolve(&base_dir)?;

        let coordinator = Arc::new(Coordinator::new(deps.provider.clone()));
        let shared = Arc::new(Shared {
            context: Mutex::new(Context::new(coordinator.clone())),
            state: Mutex::new(EngineState::Uninitialized),
            ready: AtomicBool::new(false),
            tracked: config.tracked(),
            foreground: deps.foreground.clone(),
        });
        let subscription = subscribe_handlers(&deps.notifier, &shared);

        let mut engine = MigrationEngine {
            shared,
            coordinator,
            notifier: deps.notifier.clone(),
            subscription: Some(subscription),
            stores,
            seeding: None,
        };
        engine.decide(config, &deps)?;
        Ok(engine)
    }

    fn decide(&mut self, config: &EngineConfig, deps: &Collaborators) -> Result<(), EngineError> {
        self.shared.transition(EngineState::Deciding);

        if deps.identity.current_identity_token().is_none() {
            self.coordinator.attach(&self.stores.local.without_options())?;
            self.shared.transition(EngineState::AttachedLocalOnly);
            self.shared.ready.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let seed_flag = SeedFlagStore::new(deps.key_value.clone(), config.seed_flag_key.clone());
        let seeded = seed_flag.has_seeded();
        let local_exists = self.stores.local.exists();
        tracing::debug!(seeded, local_exists, "cloud identity present");

        if !seeded && local_exists {
            self.shared.transition(EngineState::Seeding);
            let dedup = Deduplicator::new(
                config.seed_entity.entity.clone(),
                config.seed_entity.unique_key.clone(),
            );
            match self.start_seeding(seed_flag, dedup) {
                Ok(completion) => self.seeding = Some(completion),
                Err(error) => {
                    self.shared.transition(EngineState::Failed(error.to_string()));
                    return Err(error.into());
                }
            }
        } else {
            self.coordinator.attach(&self.stores.cloud)?;
            self.shared.transition(EngineState::AttachedCloudDirect);
            self.shared.ready.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn start_seeding(
        &self,
        seed_flag: SeedFlagStore,
        dedup: Deduplicator,
    ) -> Result<Completion<SeedOutcome>, StoreError> {
        let (resolver, completion) = task::completion();
        let coordinator = self.coordinator.clone();
        let shared = self.shared.clone();
        let stores = self.stores.clone();

        task::spawn_background("seed-migration", move || {
            let migrated = coordinator
                .attach(&stores.local)
                .and_then(|_| coordinator.migrate(stores.cloud.location(), stores.cloud.options()));

            let cloud_store = match migrated {
                Ok(handle) => handle,
                Err(error) => {
                    tracing::error!(%error, "seeding local store into cloud store failed");
                    shared.transition(EngineState::Failed(error.to_string()));
                    resolver.resolve(Err(error));
                    return;
                }
            };

            seed_flag.mark_seeded();

            let foreground = shared.foreground.clone();
            foreground.dispatch(Box::new(move || {
                let report = {
                    let mut context = shared.context();
                    dedup.run(&mut *context)
                };
                shared.transition(EngineState::AttachedCloud);
                shared.ready.store(true, Ordering::SeqCst);
                resolver.resolve(Ok(SeedReport {
                    cloud_store,
                    dedup: report,
                }));
            }));
        })?;

        Ok(completion)
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// False between a store-will-change and the following store-did-change,
    /// and while seeding.
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> &StorePair {
        &self.stores
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Runs `f` with exclusive access to the context. Do not publish lifecycle
    /// events from inside `f`; the handlers need the same lock.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut Context) -> R) -> R {
        let mut context = self.shared.context();
        f(&mut context)
    }

    /// Saves the context if it has changes. Returns whether anything was written.
    pub fn save_context(&self) -> Result<bool, SaveError> {
        let mut context = self.shared.context();
        if !context.has_changes() {
            return Ok(false);
        }
        context.save()?;
        Ok(true)
    }

    /// Blocks until the seeding started by `initialize` has finished,
    /// including its dedup pass. `None` if no seeding was started (or its
    /// continuation was never run).
    pub fn wait_for_seeding(&mut self) -> Option<SeedOutcome> {
        self.seeding.take()?.wait()
    }

    pub fn deinitialize(mut self) {
        self.unsubscribe();
    }

    fn unsubscribe(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.notifier.unsubscribe(id);
            tracing::debug!("lifecycle handlers removed");
        }
    }
}

impl Drop for MigrationEngine {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn subscribe_handlers(notifier: &LifecycleNotifier, shared: &Arc<Shared>) -> SubscriptionId {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    notifier.subscribe(move |event| {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        match event {
            LifecycleEvent::StoresWillChange => shared.stores_will_change(),
            LifecycleEvent::StoresDidChange => shared.stores_did_change(),
            LifecycleEvent::DidImportRemoteChanges => shared.did_import_remote_changes(),
        }
    })
}
