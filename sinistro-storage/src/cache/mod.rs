//! Persistent cache with format versioning and fail-closed semantics.
//!
//! Entries carry their capture time, the format version of the build that
//! wrote them, and an item count. A reader whose expected version differs
//! treats the entry as absent and evicts it. Every storage failure
//! (unavailable environment, full map, undecodable bytes) degrades to a
//! cache miss; nothing here returns an error to the caller.
//!
//! # Example
//!
//! ```ignore
//! let cache = PersistentCache::open(&settings);
//! cache.init();
//!
//! let key = cache.keyspace().key_for(&CollectionKey::new(CollectionName::Brands));
//! cache.set(&key, &items, CacheMetadata::now(cache.format_version(), items.len()));
//!
//! if cache.is_valid(&key, Duration::from_secs(24 * 3600)) {
//!     let entry = cache.get::<Vec<Item>>(&key);
//! }
//! ```

pub mod backend;
pub mod entry;
pub mod keyspace;
pub mod lmdb_backend;
pub mod persistent;

pub use backend::{MemoryBackend, StorageBackend, StorageUnavailable, UnavailableBackend};
pub use entry::{CacheEntry, CacheMetadata};
pub use keyspace::CacheKeyspace;
pub use lmdb_backend::LmdbBackend;
pub use persistent::{CacheSettings, CacheStats, PersistentCache};
