//! SINISTRO Storage
//!
//! Client-resident reference-data caching:
//!
//! - [`cache`]: a versioned, TTL-bound key/value cache that never fails loud.
//! - [`refdata`]: per-collection loaders with request coalescing, fronted by
//!   the [`ReferenceDataStore`] orchestration surface.
//! - [`mock`]: a scriptable fetcher for tests.

pub mod cache;
pub mod mock;
pub mod refdata;

pub use cache::{
    CacheEntry, CacheKeyspace, CacheMetadata, CacheSettings, CacheStats, LmdbBackend,
    MemoryBackend, PersistentCache, StorageBackend, StorageUnavailable, UnavailableBackend,
};
pub use mock::{MockFetcher, MockResponse};
pub use refdata::{
    CollectionFetcher, CollectionHandle, CollectionLoader, CollectionState, FetchResponse,
    Invalidation, LoadMode, MutationNotice, ReferenceDataStore, StoreEvent, StoreStatus,
    TtlPolicy,
};
