//! The reference-data store: one surface for loading, invalidating and
//! observing every collection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{join_all, FutureExt};
use sinistro_core::{CollectionKey, CollectionName, RefDataError, RefDataResult};
use tokio::sync::broadcast;

use super::fetcher::{fetch_items, CollectionFetcher};
use super::loader::{CollectionLoader, LoadStep, PendingLoad};
use super::policy::TtlPolicy;
use super::state::CollectionState;
use crate::cache::PersistentCache;

const EVENT_CAPACITY: usize = 64;

/// How a load treats cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Serve fresh in-memory or persisted data when available.
    Normal,
    /// Skip both caches and fetch, still joining a fetch already in flight.
    Force,
}

/// Scope of an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    Collection(CollectionName),
    All,
}

/// Signal from a CRUD flow that reference data changed.
///
/// A notice that cannot name its collection invalidates everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationNotice {
    pub collection: Option<CollectionName>,
}

impl MutationNotice {
    pub fn collection(name: CollectionName) -> Self {
        Self {
            collection: Some(name),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    fn invalidation(self) -> Invalidation {
        match self.collection {
            Some(name) => Invalidation::Collection(name),
            None => Invalidation::All,
        }
    }
}

/// Store notifications, for redrawing.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Loading(CollectionKey),
    Loaded(CollectionKey),
    Failed(CollectionKey, RefDataError),
    Invalidated(Invalidation),
}

/// Global loading/error summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStatus {
    pub loading: bool,
    pub errors: Vec<(CollectionKey, RefDataError)>,
}

struct StoreInner {
    cache: Arc<PersistentCache>,
    fetcher: Arc<dyn CollectionFetcher>,
    policy: TtlPolicy,
    loaders: Mutex<HashMap<CollectionKey, CollectionLoader>>,
    events: broadcast::Sender<StoreEvent>,
}

impl StoreInner {
    fn loaders(&self) -> MutexGuard<'_, HashMap<CollectionKey, CollectionLoader>> {
        // Loader state is plain data; a panic elsewhere cannot leave it torn.
        self.loaders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_loader(&self, key: &CollectionKey) -> CollectionLoader {
        CollectionLoader::new(
            key.clone(),
            self.cache.keyspace().key_for(key),
            self.policy.ttl_for(key.name()),
        )
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn complete(
        &self,
        key: &CollectionKey,
        epoch: u64,
        outcome: RefDataResult<Vec<sinistro_core::Item>>,
    ) -> CollectionState {
        let event = match &outcome {
            Ok(items) => {
                tracing::debug!(collection = %key, items = items.len(), "reference collection loaded");
                StoreEvent::Loaded(key.clone())
            }
            Err(error) => {
                tracing::warn!(collection = %key, error = %error, "reference collection fetch failed");
                StoreEvent::Failed(key.clone(), error.clone())
            }
        };

        let (state, published) = {
            let mut loaders = self.loaders();
            match loaders.get_mut(key) {
                Some(loader) => loader.finish(epoch, outcome, &self.cache),
                None => (CollectionLoader::detached_state(outcome), false),
            }
        };

        if published {
            self.emit(event);
        } else {
            tracing::debug!(collection = %key, "discarding result of detached fetch");
        }
        state
    }
}

/// Orchestrates every [`CollectionLoader`] behind one surface.
///
/// Cloning is cheap and clones share state. Loads must run inside a tokio
/// runtime: fetches are spawned so that they complete, publish, and persist
/// even if every caller stops waiting.
#[derive(Clone)]
pub struct ReferenceDataStore {
    inner: Arc<StoreInner>,
}

impl ReferenceDataStore {
    pub fn new(
        cache: Arc<PersistentCache>,
        fetcher: Arc<dyn CollectionFetcher>,
        policy: TtlPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                cache,
                fetcher,
                policy,
                loaders: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn cache(&self) -> &PersistentCache {
        &self.inner.cache
    }

    /// Handle bound to one collection, for consumers.
    pub fn collection(&self, key: CollectionKey) -> CollectionHandle {
        CollectionHandle {
            store: self.clone(),
            key,
        }
    }

    /// Load `key`, serving cached data when it is fresh.
    ///
    /// At most one fetch per key is in flight; concurrent callers share it
    /// and observe the same result.
    pub async fn load(&self, key: &CollectionKey) -> CollectionState {
        self.load_with(key, LoadMode::Normal).await
    }

    /// Load `key` from the backend regardless of TTL.
    pub async fn force_reload(&self, key: &CollectionKey) -> CollectionState {
        self.load_with(key, LoadMode::Force).await
    }

    pub async fn load_with(&self, key: &CollectionKey, mode: LoadMode) -> CollectionState {
        loop {
            let (pending, detached) = {
                let mut loaders = self.inner.loaders();
                let loader = loaders
                    .entry(key.clone())
                    .or_insert_with(|| self.inner.new_loader(key));
                match loader.begin(mode, &self.inner.cache) {
                    LoadStep::Ready(state) => return state,
                    LoadStep::Join(pending) => (pending, false),
                    LoadStep::AwaitDetached(pending) => (pending, true),
                    LoadStep::Start { epoch } => {
                        let pending = Self::spawn_fetch(&self.inner, key.clone(), epoch);
                        loader.attach(epoch, pending.clone());
                        self.inner.emit(StoreEvent::Loading(key.clone()));
                        (pending, false)
                    }
                }
            };
            if !detached {
                return pending.await;
            }
            // One fetch per key at a time: let the detached one finish, then
            // ask again under the new epoch.
            tracing::debug!(collection = %key, "waiting for detached fetch before refetching");
            pending.await;
        }
    }

    fn spawn_fetch(inner: &Arc<StoreInner>, key: CollectionKey, epoch: u64) -> PendingLoad {
        let task_inner = Arc::clone(inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let outcome = fetch_items(task_inner.fetcher.as_ref(), &task_key).await;
            task_inner.complete(&task_key, epoch, outcome)
        });

        let inner = Arc::clone(inner);
        async move {
            match handle.await {
                Ok(state) => state,
                Err(join_error) => {
                    let error = RefDataError::fetch_failed(
                        key.to_string(),
                        format!("fetch task aborted: {join_error}"),
                    );
                    inner.complete(&key, epoch, Err(error))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Current state of `key` without triggering a load.
    pub fn state(&self, key: &CollectionKey) -> CollectionState {
        self.inner
            .loaders()
            .get(key)
            .map(CollectionLoader::state)
            .unwrap_or_default()
    }

    pub fn is_loaded(&self, key: &CollectionKey) -> bool {
        self.inner
            .loaders()
            .get(key)
            .is_some_and(CollectionLoader::is_loaded)
    }

    /// Load several collections concurrently, e.g. at startup.
    pub async fn initialize<I>(&self, keys: I) -> Vec<CollectionState>
    where
        I: IntoIterator<Item = CollectionKey>,
    {
        let keys: Vec<CollectionKey> = keys.into_iter().collect();
        join_all(keys.iter().map(|key| self.load(key))).await
    }

    /// Drop cached data for one collection (every parent key) or for all.
    ///
    /// Nothing is reloaded here; the next load fetches. A fetch running at
    /// this moment is detached and its result discarded.
    pub fn invalidate(&self, scope: Invalidation) {
        {
            let mut loaders = self.inner.loaders();
            for loader in loaders.values_mut() {
                let hit = match scope {
                    Invalidation::All => true,
                    Invalidation::Collection(name) => loader.key().name() == name,
                };
                if hit {
                    loader.invalidate(&self.inner.cache);
                }
            }
        }

        match scope {
            Invalidation::Collection(name) => {
                let prefix = self.inner.cache.keyspace().collection_prefix(name);
                self.inner.cache.remove_prefix(&prefix);
            }
            Invalidation::All => {
                self.inner.cache.clear_all();
            }
        }

        tracing::debug!(?scope, "reference data invalidated");
        self.inner.emit(StoreEvent::Invalidated(scope));
    }

    /// Entry point for CRUD flows after a create/update/delete.
    pub fn notify_mutation(&self, notice: MutationNotice) {
        self.invalidate(notice.invalidation());
    }

    pub fn status(&self) -> StoreStatus {
        let loaders = self.inner.loaders();
        let mut errors: Vec<(CollectionKey, RefDataError)> = loaders
            .values()
            .filter_map(|loader| {
                loader
                    .state()
                    .error
                    .map(|error| (loader.key().clone(), error))
            })
            .collect();
        errors.sort_by_key(|(key, _)| key.to_string());
        StoreStatus {
            loading: loaders.values().any(CollectionLoader::is_loading),
            errors,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }
}

/// A consumer's view of one collection.
#[derive(Clone)]
pub struct CollectionHandle {
    store: ReferenceDataStore,
    key: CollectionKey,
}

impl CollectionHandle {
    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn state(&self) -> CollectionState {
        self.store.state(&self.key)
    }

    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded(&self.key)
    }

    pub async fn load(&self) -> CollectionState {
        self.store.load(&self.key).await
    }

    /// Retry affordance: load again, honoring the TTL.
    pub async fn reload(&self) -> CollectionState {
        self.store.load(&self.key).await
    }

    pub async fn force_reload(&self) -> CollectionState {
        self.store.force_reload(&self.key).await
    }

    pub fn invalidate(&self) {
        self.store
            .invalidate(Invalidation::Collection(self.key.name()));
    }
}
