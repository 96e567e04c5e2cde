//! The process-wide persistent cache.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use super::backend::{MemoryBackend, StorageBackend, StorageUnavailable, UnavailableBackend};
use super::entry::{CacheEntry, CacheMetadata, EntryHeader};
use super::keyspace::CacheKeyspace;
use super::lmdb_backend::LmdbBackend;

/// Where and how the cache is stored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// LMDB directory. `None` keeps the cache in memory for the session.
    pub path: Option<PathBuf>,
    pub namespace: String,
    pub format_version: String,
    pub max_size_mb: usize,
    /// Remove entries left behind by other format versions on `init()`.
    pub sweep_on_init: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: None,
            namespace: "sinistro".to_string(),
            format_version: "2".to_string(),
            max_size_mb: 16,
            sweep_on_init: true,
        }
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of reads that returned an entry.
    pub hits: u64,
    /// Number of reads that found nothing usable.
    pub misses: u64,
    /// Number of successful writes.
    pub writes: u64,
    /// Entries evicted on read for carrying a foreign format version or an
    /// undecodable payload.
    pub evictions: u64,
    /// Operations that hit a storage failure.
    pub failures: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
    failures: AtomicU64,
}

/// Versioned key/value cache over a [`StorageBackend`].
///
/// Every public operation is infallible at the type level: storage failures
/// come back as `false`, `None`, or `0`, and a broken backend behaves as an
/// always-miss cache. The first failure is logged at `warn`, later ones at
/// `debug`.
pub struct PersistentCache {
    backend: Box<dyn StorageBackend>,
    keyspace: CacheKeyspace,
    sweep_on_init: bool,
    degraded: AtomicBool,
    counters: Counters,
}

impl PersistentCache {
    pub fn new(backend: Box<dyn StorageBackend>, keyspace: CacheKeyspace) -> Self {
        Self {
            backend,
            keyspace,
            sweep_on_init: true,
            degraded: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// In-memory cache, mostly for tests.
    pub fn in_memory(namespace: impl Into<String>, format_version: impl Into<String>) -> Self {
        Self::new(
            Box::new(MemoryBackend::new()),
            CacheKeyspace::new(namespace, format_version),
        )
    }

    /// Open the cache described by `settings`.
    ///
    /// An LMDB environment that cannot be opened is not an error: the cache
    /// comes up over an [`UnavailableBackend`] and every read misses.
    pub fn open(settings: &CacheSettings) -> Self {
        let keyspace = CacheKeyspace::new(&settings.namespace, &settings.format_version);
        let backend: Box<dyn StorageBackend> = match &settings.path {
            None => Box::new(MemoryBackend::new()),
            Some(path) => match LmdbBackend::open(path, settings.max_size_mb) {
                Ok(backend) => Box::new(backend),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "persistent cache unavailable, continuing without it"
                    );
                    Box::new(UnavailableBackend::new(e.reason))
                }
            },
        };
        let mut cache = Self::new(backend, keyspace);
        cache.sweep_on_init = settings.sweep_on_init;
        cache
    }

    /// Startup hook: sweeps entries of superseded format versions when
    /// enabled. Returns the number of swept keys.
    pub fn init(&self) -> usize {
        if !self.sweep_on_init {
            return 0;
        }
        let swept = self.sweep_superseded();
        if swept > 0 {
            tracing::info!(swept, version = self.keyspace.version(), "swept superseded cache entries");
        }
        swept
    }

    /// Shutdown hook: flushes the backend.
    pub fn teardown(&self) -> bool {
        match self.backend.flush() {
            Ok(()) => true,
            Err(e) => {
                self.degrade("flush", &e);
                false
            }
        }
    }

    pub fn keyspace(&self) -> &CacheKeyspace {
        &self.keyspace
    }

    /// Format version this build reads and writes.
    pub fn format_version(&self) -> &str {
        self.keyspace.version()
    }

    /// Whether a storage failure has been observed.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Store `payload` under `key`.
    pub fn set<T: Serialize>(&self, key: &str, payload: &T, metadata: CacheMetadata) -> bool {
        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            metadata,
        };
        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(key, error = %e, "cache payload not serializable");
                return false;
            }
        };
        match self.backend.write(key, &bytes) {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.degrade("set", &e);
                false
            }
        }
    }

    /// Read the entry under `key`.
    ///
    /// Entries of another format version, and entries that cannot be
    /// decoded as `T`, are evicted and reported as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        self.lookup(key, |_| true)
    }

    /// Read the entry under `key` if it is no older than `max_age`.
    ///
    /// One backend read; an expired entry counts as a miss and is left in
    /// place.
    pub fn get_valid<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<CacheEntry<T>> {
        let now = Utc::now();
        self.lookup(key, |metadata| metadata.age_at(now) <= max_age)
    }

    /// Whether `key` holds a current-format entry no older than `max_age`.
    pub fn is_valid(&self, key: &str, max_age: Duration) -> bool {
        self.get_valid::<IgnoredAny>(key, max_age).is_some()
    }

    fn lookup<T: DeserializeOwned>(
        &self,
        key: &str,
        accept: impl Fn(&CacheMetadata) -> bool,
    ) -> Option<CacheEntry<T>> {
        let bytes = match self.backend.read(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                self.degrade("get", &e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let usable = serde_json::from_slice::<EntryHeader>(&bytes)
            .ok()
            .filter(|header| header.metadata.format_version == self.keyspace.version())
            .and_then(|_| serde_json::from_slice::<CacheEntry<T>>(&bytes).ok());

        match usable {
            Some(entry) if accept(&entry.metadata) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Some(_) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                tracing::debug!(key, "evicting stale or undecodable cache entry");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                self.remove(key);
                None
            }
        }
    }

    /// Delete `key`. Returns whether an entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        match self.backend.delete(key) {
            Ok(removed) => removed,
            Err(e) => {
                self.degrade("remove", &e);
                false
            }
        }
    }

    /// Delete every key starting with `prefix`. Returns how many went.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        self.remove_where(|key| key.starts_with(prefix), "remove_prefix")
    }

    /// Delete every key of this cache's namespace, whatever its version.
    pub fn clear_all(&self) -> bool {
        let prefix = self.keyspace.namespace_prefix();
        match self.backend.keys() {
            Ok(keys) => {
                let mut ok = true;
                for key in keys.iter().filter(|key| key.starts_with(&prefix)) {
                    if let Err(e) = self.backend.delete(key) {
                        self.degrade("clear_all", &e);
                        ok = false;
                    }
                }
                ok
            }
            Err(e) => {
                self.degrade("clear_all", &e);
                false
            }
        }
    }

    /// Delete keys of this namespace written under another format version.
    pub fn sweep_superseded(&self) -> usize {
        let keyspace = self.keyspace.clone();
        self.remove_where(|key| keyspace.is_superseded(key), "sweep")
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    fn remove_where(&self, predicate: impl Fn(&str) -> bool, op: &'static str) -> usize {
        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                self.degrade(op, &e);
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys.iter().filter(|key| predicate(key)) {
            match self.backend.delete(key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => self.degrade(op, &e),
            }
        }
        removed
    }

    fn degrade(&self, op: &'static str, error: &StorageUnavailable) {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        if self.degraded.swap(true, Ordering::Relaxed) {
            tracing::debug!(op, error = %error, "persistent cache operation failed");
        } else {
            tracing::warn!(op, error = %error, "persistent cache degraded to always-miss");
        }
    }
}

impl std::fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache")
            .field("keyspace", &self.keyspace)
            .field("degraded", &self.is_degraded())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use sinistro_core::Item;
    use std::sync::Arc;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    /// Backend sharing its storage with the test, so two caches with
    /// different versions can look at the same bytes.
    struct SharedBackend(Arc<MemoryBackend>);

    impl StorageBackend for SharedBackend {
        fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageUnavailable> {
            self.0.read(key)
        }
        fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageUnavailable> {
            self.0.write(key, value)
        }
        fn delete(&self, key: &str) -> Result<bool, StorageUnavailable> {
            self.0.delete(key)
        }
        fn keys(&self) -> Result<Vec<String>, StorageUnavailable> {
            self.0.keys()
        }
    }

    fn shared_cache(storage: &Arc<MemoryBackend>, version: &str) -> PersistentCache {
        PersistentCache::new(
            Box::new(SharedBackend(Arc::clone(storage))),
            CacheKeyspace::new("sinistro", version),
        )
    }

    fn items() -> Vec<Item> {
        vec![Item::new(1, "Pátio A"), Item::new(2, "Pátio B")]
    }

    #[test]
    fn test_set_then_get() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        assert!(cache.set("k", &items(), CacheMetadata::now("2", 2)));
        let entry = cache.get::<Vec<Item>>("k").unwrap();
        assert_eq!(entry.payload, items());
        assert_eq!(entry.metadata.item_count, 2);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_foreign_version_is_evicted_on_read() {
        let storage = Arc::new(MemoryBackend::new());
        let v1 = shared_cache(&storage, "1");
        assert!(v1.set("k", &items(), CacheMetadata::now("1", 2)));

        let v2 = shared_cache(&storage, "2");
        assert!(v2.get::<Vec<Item>>("k").is_none());
        assert!(storage.read("k").unwrap().is_none(), "stale entry must be removed");
        assert_eq!(v2.stats().evictions, 1);
    }

    #[test]
    fn test_ttl_boundaries() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let now = Utc::now();
        let one_sec = ChronoDuration::seconds(1);
        let ttl = ChronoDuration::from_std(DAY).unwrap();

        cache.set("old", &items(), CacheMetadata::new(now - (ttl + one_sec), "2", 2));
        cache.set("young", &items(), CacheMetadata::new(now - (ttl - one_sec), "2", 2));

        assert!(!cache.is_valid("old", DAY));
        assert!(cache.is_valid("young", DAY));
        assert!(!cache.is_valid("absent", DAY));
    }

    #[test]
    fn test_get_valid_reads_once() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        let ttl = ChronoDuration::from_std(DAY).unwrap();
        cache.set("fresh", &items(), CacheMetadata::now("2", 2));
        cache.set(
            "expired",
            &items(),
            CacheMetadata::new(Utc::now() - ttl - ChronoDuration::seconds(1), "2", 2),
        );

        let entry = cache.get_valid::<Vec<Item>>("fresh", DAY);
        assert_eq!(entry.map(|e| e.payload), Some(items()));
        assert!(cache.get_valid::<Vec<Item>>("expired", DAY).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 0);
        // Expired entries stay put; only a foreign format evicts.
        assert!(cache.get::<Vec<Item>>("expired").is_some());
    }

    #[test]
    fn test_malformed_payload_is_a_miss() {
        let storage = Arc::new(MemoryBackend::new());
        storage.write("k", b"not json at all").unwrap();
        let cache = shared_cache(&storage, "2");
        assert!(cache.get::<Vec<Item>>("k").is_none());
        assert!(!cache.is_valid("k", DAY));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_wrong_payload_type_is_a_miss() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        cache.set("k", &"just a string", CacheMetadata::now("2", 1));
        assert!(cache.get::<Vec<Item>>("k").is_none());
    }

    #[test]
    fn test_unavailable_backend_fails_closed() {
        let cache = PersistentCache::new(
            Box::new(UnavailableBackend::new("quota exceeded")),
            CacheKeyspace::new("sinistro", "2"),
        );
        assert!(!cache.set("k", &items(), CacheMetadata::now("2", 2)));
        assert!(cache.get::<Vec<Item>>("k").is_none());
        assert!(!cache.is_valid("k", DAY));
        assert!(!cache.remove("k"));
        assert!(!cache.clear_all());
        assert_eq!(cache.remove_prefix("sinistro:"), 0);
        assert!(!cache.teardown());
        assert!(cache.is_degraded());
        assert!(cache.stats().failures >= 5);
    }

    #[test]
    fn test_init_sweeps_superseded_versions() {
        let storage = Arc::new(MemoryBackend::new());
        storage.write("sinistro:marcas_v1", b"{}").unwrap();
        storage.write("sinistro:cidades.SP_v1", b"{}").unwrap();
        storage.write("sinistro:marcas_v2", b"{}").unwrap();
        storage.write("outro:marcas_v1", b"{}").unwrap();

        let cache = shared_cache(&storage, "2");
        assert_eq!(cache.init(), 2);
        let mut keys = storage.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["outro:marcas_v1", "sinistro:marcas_v2"]);
    }

    #[test]
    fn test_clear_all_stays_in_namespace() {
        let storage = Arc::new(MemoryBackend::new());
        storage.write("outro:x_v2", b"{}").unwrap();
        let cache = shared_cache(&storage, "2");
        cache.set("sinistro:marcas_v2", &items(), CacheMetadata::now("2", 2));
        cache.set("sinistro:posicoes_v2", &items(), CacheMetadata::now("2", 2));
        assert!(cache.clear_all());
        assert_eq!(storage.keys().unwrap(), vec!["outro:x_v2".to_string()]);
    }

    #[test]
    fn test_remove_prefix() {
        let cache = PersistentCache::in_memory("sinistro", "2");
        cache.set("sinistro:cidades.SP_v2", &items(), CacheMetadata::now("2", 2));
        cache.set("sinistro:cidades.RJ_v2", &items(), CacheMetadata::now("2", 2));
        cache.set("sinistro:marcas_v2", &items(), CacheMetadata::now("2", 2));
        assert_eq!(cache.remove_prefix("sinistro:cidades"), 2);
        assert!(cache.get::<Vec<Item>>("sinistro:marcas_v2").is_some());
    }

    #[test]
    fn test_open_without_path_is_in_memory() {
        let cache = PersistentCache::open(&CacheSettings::default());
        assert!(cache.set("k", &items(), CacheMetadata::now("2", 2)));
        assert!(cache.is_valid("k", DAY));
    }

    #[test]
    fn test_open_lmdb_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = CacheSettings {
            path: Some(dir.path().join("refdata")),
            ..CacheSettings::default()
        };
        let cache = PersistentCache::open(&settings);
        assert!(cache.set("sinistro:marcas_v2", &items(), CacheMetadata::now("2", 2)));
        assert!(cache.teardown());
        assert!(!cache.is_degraded());
    }

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
