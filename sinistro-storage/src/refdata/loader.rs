//! Per-collection loader.
//!
//! A loader owns the in-memory [`CollectionState`] of one collection key and
//! the handle of its in-flight fetch, if any. It never performs I/O itself:
//! the store asks it what to do ([`LoadStep`]), runs the fetch, and hands the
//! outcome back through [`CollectionLoader::finish`].

use std::time::Duration;

use chrono::Utc;
use futures_util::future::{BoxFuture, Shared};
use sinistro_core::{CollectionKey, Item, RefDataResult};

use super::state::CollectionState;
use super::store::LoadMode;
use crate::cache::{CacheMetadata, PersistentCache};

/// A fetch shared by every caller that asked for the collection while it
/// was running.
pub(crate) type PendingLoad = Shared<BoxFuture<'static, CollectionState>>;

/// What the store must do to satisfy a load request.
pub(crate) enum LoadStep {
    /// Answer immediately.
    Ready(CollectionState),
    /// Await the fetch already in flight.
    Join(PendingLoad),
    /// A fetch from before the last invalidation is still running. Await it,
    /// discard its result, and ask again.
    AwaitDetached(PendingLoad),
    /// Start a fetch tagged with `epoch`, then [`CollectionLoader::attach`] it.
    Start { epoch: u64 },
}

pub struct CollectionLoader {
    key: CollectionKey,
    storage_key: String,
    ttl: Duration,
    state: CollectionState,
    initialized: bool,
    /// Bumped by invalidation; fetches started under an older epoch are
    /// detached and never published.
    epoch: u64,
    /// The one outstanding fetch and the epoch it was started under. A
    /// detached fetch stays here until it completes.
    in_flight: Option<(u64, PendingLoad)>,
}

impl CollectionLoader {
    pub fn new(key: CollectionKey, storage_key: String, ttl: Duration) -> Self {
        Self {
            key,
            storage_key,
            ttl,
            state: CollectionState::empty(),
            initialized: false,
            epoch: 0,
            in_flight: None,
        }
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn state(&self) -> CollectionState {
        self.state.clone()
    }

    /// Whether a successful load has happened since creation or the last
    /// invalidation.
    pub fn is_loaded(&self) -> bool {
        self.initialized
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    fn is_fresh(&self) -> bool {
        self.initialized
            && self.state.error.is_none()
            && self.state.last_loaded_at.is_some_and(|at| {
                Utc::now()
                    .signed_duration_since(at)
                    .to_std()
                    .map(|age| age <= self.ttl)
                    .unwrap_or(true)
            })
    }

    pub(crate) fn begin(&mut self, mode: LoadMode, cache: &PersistentCache) -> LoadStep {
        if let Some((epoch, pending)) = &self.in_flight {
            if *epoch == self.epoch {
                return LoadStep::Join(pending.clone());
            }
            self.state.loading = true;
            return LoadStep::AwaitDetached(pending.clone());
        }

        if mode == LoadMode::Normal {
            if self.is_fresh() {
                return LoadStep::Ready(self.state.clone());
            }
            if let Some(entry) = cache.get_valid::<Vec<Item>>(&self.storage_key, self.ttl) {
                self.state = CollectionState::loaded(entry.payload, entry.metadata.captured_at);
                self.initialized = true;
                return LoadStep::Ready(self.state.clone());
            }
        }

        self.state.loading = true;
        LoadStep::Start { epoch: self.epoch }
    }

    pub(crate) fn attach(&mut self, epoch: u64, pending: PendingLoad) {
        self.in_flight = Some((epoch, pending));
    }

    /// Apply a fetch outcome.
    ///
    /// Returns the state the fetch's waiters observe and whether it was
    /// published. Outcomes from a detached fetch are not published: they go
    /// back to their own waiters only.
    pub(crate) fn finish(
        &mut self,
        epoch: u64,
        outcome: RefDataResult<Vec<Item>>,
        cache: &PersistentCache,
    ) -> (CollectionState, bool) {
        if self.in_flight.as_ref().is_some_and(|(started, _)| *started == epoch) {
            self.in_flight = None;
        }
        if epoch != self.epoch {
            // Nothing is published, but waiters parked behind this fetch
            // have marked the state loading; they start over now.
            self.state.loading = false;
            return (Self::detached_state(outcome), false);
        }

        match outcome {
            Ok(items) => {
                let now = Utc::now();
                let metadata = CacheMetadata::new(now, cache.format_version(), items.len());
                cache.set(&self.storage_key, &items, metadata);
                self.state = CollectionState::loaded(items, now);
                self.initialized = true;
            }
            Err(error) => {
                // Keep whatever was shown before; an empty list only when
                // there was nothing to keep.
                self.state.loading = false;
                self.state.error = Some(error);
            }
        }
        (self.state.clone(), true)
    }

    pub(crate) fn detached_state(outcome: RefDataResult<Vec<Item>>) -> CollectionState {
        match outcome {
            Ok(items) => CollectionState::loaded(items, Utc::now()),
            Err(error) => CollectionState::failed(error),
        }
    }

    /// Drop the persisted entry and in-memory state. The next load fetches.
    ///
    /// A running fetch is detached: it keeps its slot until it completes so
    /// that no second fetch starts alongside it, but its result is never
    /// published.
    pub(crate) fn invalidate(&mut self, cache: &PersistentCache) {
        cache.remove(&self.storage_key);
        self.state = CollectionState::empty();
        self.initialized = false;
        self.epoch += 1;
    }
}

impl std::fmt::Debug for CollectionLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionLoader")
            .field("key", &self.key)
            .field("initialized", &self.initialized)
            .field("epoch", &self.epoch)
            .field("loading", &self.is_loading())
            .field("items", &self.state.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use futures_util::future::{self, FutureExt};
    use sinistro_core::{CollectionName, RefDataError};

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn loader(cache: &PersistentCache) -> CollectionLoader {
        let key = CollectionKey::new(CollectionName::Positions);
        let storage_key = cache.keyspace().key_for(&key);
        CollectionLoader::new(key, storage_key, DAY)
    }

    #[test]
    fn cold_loader_starts_a_fetch() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let mut loader = loader(&cache);
        assert!(matches!(loader.begin(LoadMode::Normal, &cache), LoadStep::Start { epoch: 0 }));
        assert!(loader.state().loading);
    }

    #[test]
    fn valid_cache_entry_is_served() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let mut loader = loader(&cache);
        let items = vec![Item::new(1, "Pátio A")];
        let captured = Utc::now() - ChronoDuration::hours(2);
        cache.set(loader.storage_key(), &items, CacheMetadata::new(captured, "2", 1));

        match loader.begin(LoadMode::Normal, &cache) {
            LoadStep::Ready(state) => {
                assert_eq!(*state.items, items);
                assert_eq!(state.last_loaded_at, Some(captured));
            }
            _ => panic!("expected cached state"),
        }
        assert!(loader.is_loaded());
    }

    #[test]
    fn forced_load_skips_cache() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let mut loader = loader(&cache);
        cache.set(loader.storage_key(), &vec![Item::new(1, "A")], CacheMetadata::now("2", 1));
        assert!(matches!(loader.begin(LoadMode::Force, &cache), LoadStep::Start { .. }));
    }

    #[test]
    fn success_persists_and_publishes() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let mut loader = loader(&cache);
        let _ = loader.begin(LoadMode::Normal, &cache);
        let (state, published) = loader.finish(0, Ok(vec![Item::new(1, "A")]), &cache);
        assert!(published);
        assert!(!state.loading);
        assert!(loader.is_loaded());
        assert!(cache.is_valid(loader.storage_key(), DAY));
    }

    #[test]
    fn failure_keeps_previous_items() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let mut loader = loader(&cache);
        let _ = loader.begin(LoadMode::Normal, &cache);
        loader.finish(0, Ok(vec![Item::new(1, "A")]), &cache);

        let _ = loader.begin(LoadMode::Force, &cache);
        let (state, _) = loader.finish(0, Err(RefDataError::fetch_failed("posicoes", "500")), &cache);
        assert_eq!(state.len(), 1);
        assert!(state.error.is_some());
        assert!(!state.loading);
    }

    #[test]
    fn invalidation_detaches_in_flight_fetch() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let mut loader = loader(&cache);
        let LoadStep::Start { epoch } = loader.begin(LoadMode::Normal, &cache) else {
            panic!("expected start");
        };
        loader.invalidate(&cache);

        let (state, published) = loader.finish(epoch, Ok(vec![Item::new(1, "A")]), &cache);
        assert!(!published);
        assert_eq!(state.len(), 1);
        assert!(loader.state().is_empty());
        assert!(!loader.is_loaded());
        assert!(!cache.is_valid(loader.storage_key(), DAY));
    }

    #[test]
    fn detached_fetch_keeps_the_slot_until_it_completes() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let mut loader = loader(&cache);
        let LoadStep::Start { epoch } = loader.begin(LoadMode::Normal, &cache) else {
            panic!("expected start");
        };
        let pending: PendingLoad = future::ready(CollectionState::empty()).boxed().shared();
        loader.attach(epoch, pending);
        loader.invalidate(&cache);

        assert!(loader.is_loading());
        assert!(matches!(loader.begin(LoadMode::Force, &cache), LoadStep::AwaitDetached(_)));
        assert!(loader.state().loading);

        let (_, published) = loader.finish(epoch, Ok(vec![Item::new(1, "A")]), &cache);
        assert!(!published);
        assert!(!loader.is_loading());
        assert!(!loader.state().loading);
        assert!(matches!(
            loader.begin(LoadMode::Normal, &cache),
            LoadStep::Start { epoch: 1 }
        ));
    }
}
