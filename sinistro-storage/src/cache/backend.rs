//! Storage backend trait and the non-persistent implementations.
//!
//! Backends move raw bytes under string keys. They know nothing about
//! entries, versions, or collections; [`PersistentCache`] layers those on
//! top.
//!
//! [`PersistentCache`]: super::PersistentCache

use std::collections::BTreeMap;
use std::sync::RwLock;

use sinistro_core::RefDataError;

/// The only failure a backend reports.
///
/// Callers above [`PersistentCache`](super::PersistentCache) never see it:
/// the cache logs it and answers as if the key were absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("storage unavailable: {reason}")]
pub struct StorageUnavailable {
    pub reason: String,
}

impl StorageUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<StorageUnavailable> for RefDataError {
    fn from(e: StorageUnavailable) -> Self {
        RefDataError::StorageUnavailable { reason: e.reason }
    }
}

/// Raw key/value storage.
///
/// Operations are synchronous; implementations must be safe to share
/// across threads.
pub trait StorageBackend: Send + Sync {
    /// Read the bytes stored under `key`.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageUnavailable>;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageUnavailable>;

    /// Delete `key`. Returns whether something was removed.
    fn delete(&self, key: &str) -> Result<bool, StorageUnavailable>;

    /// List every stored key.
    fn keys(&self) -> Result<Vec<String>, StorageUnavailable>;

    /// Push buffered writes to durable storage.
    fn flush(&self) -> Result<(), StorageUnavailable> {
        Ok(())
    }
}

/// In-process backend. Used for tests and as the session-only fallback.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageUnavailable {
    StorageUnavailable::new("memory backend lock poisoned")
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageUnavailable> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageUnavailable> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageUnavailable> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StorageUnavailable> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.keys().cloned().collect())
    }
}

/// Backend whose every operation fails.
///
/// Stands in when the real storage cannot be opened, turning the cache into
/// an always-miss cache.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err(&self) -> StorageUnavailable {
        StorageUnavailable::new(self.reason.clone())
    }
}

impl StorageBackend for UnavailableBackend {
    fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageUnavailable> {
        Err(self.err())
    }

    fn write(&self, _key: &str, _value: &[u8]) -> Result<(), StorageUnavailable> {
        Err(self.err())
    }

    fn delete(&self, _key: &str) -> Result<bool, StorageUnavailable> {
        Err(self.err())
    }

    fn keys(&self) -> Result<Vec<String>, StorageUnavailable> {
        Err(self.err())
    }

    fn flush(&self) -> Result<(), StorageUnavailable> {
        Err(self.err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_round_trip() {
        let backend = MemoryBackend::new();
        backend.write("a", b"1").unwrap();
        assert_eq!(backend.read("a").unwrap(), Some(b"1".to_vec()));
        assert!(backend.delete("a").unwrap());
        assert!(!backend.delete("a").unwrap());
        assert!(backend.is_empty());
    }

    #[test]
    fn unavailable_backend_always_fails() {
        let backend = UnavailableBackend::new("quota exceeded");
        let err = backend.read("a").unwrap_err();
        assert_eq!(err.reason, "quota exceeded");
        assert!(backend.write("a", b"x").is_err());
        assert!(backend.keys().is_err());
    }

    #[test]
    fn converts_into_ref_data_error() {
        let err: RefDataError = StorageUnavailable::new("disk gone").into();
        assert!(matches!(err, RefDataError::StorageUnavailable { .. }));
    }
}
