//! LMDB-backed storage.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped
//! key/value file that survives restarts of the console, the way browser
//! local storage survives page reloads.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `read` and `keys`
//! - Write transactions for `write` and `delete`
//!
//! A full map (`MDB_MAP_FULL`) surfaces as [`StorageUnavailable`], the
//! equivalent of a quota-exceeded error.

use std::path::Path;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

use super::backend::{StorageBackend, StorageUnavailable};

fn unavailable(context: &str, e: impl std::fmt::Display) -> StorageUnavailable {
    StorageUnavailable::new(format!("{context}: {e}"))
}

/// LMDB storage backend.
///
/// # Example
///
/// ```ignore
/// let backend = LmdbBackend::open("/var/cache/sinistro", 16)?;
/// backend.write("sinistro:marcas_v2", b"{...}")?;
/// ```
pub struct LmdbBackend {
    env: Env,
    db: Database<Str, Bytes>,
}

impl LmdbBackend {
    /// Open (creating if needed) an LMDB environment at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the map in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, StorageUnavailable> {
        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                StorageUnavailable::new(format!("invalid map size: {max_size_mb} MB"))
            })?;
        std::fs::create_dir_all(&path).map_err(|e| unavailable("create cache dir", e))?;

        // SAFETY: the environment directory is owned by this process; heed
        // requires the caller to not open the same path twice concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| unavailable("open environment", e))?;

        let mut wtxn = env.write_txn().map_err(|e| unavailable("write txn", e))?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| unavailable("create database", e))?;
        wtxn.commit().map_err(|e| unavailable("commit", e))?;

        Ok(Self { env, db })
    }
}

impl StorageBackend for LmdbBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageUnavailable> {
        let rtxn = self.env.read_txn().map_err(|e| unavailable("read txn", e))?;
        let value = self
            .db
            .get(&rtxn, key)
            .map_err(|e| unavailable("get", e))?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageUnavailable> {
        let mut wtxn = self.env.write_txn().map_err(|e| unavailable("write txn", e))?;
        self.db
            .put(&mut wtxn, key, value)
            .map_err(|e| unavailable("put", e))?;
        wtxn.commit().map_err(|e| unavailable("commit", e))
    }

    fn delete(&self, key: &str) -> Result<bool, StorageUnavailable> {
        let mut wtxn = self.env.write_txn().map_err(|e| unavailable("write txn", e))?;
        let deleted = self
            .db
            .delete(&mut wtxn, key)
            .map_err(|e| unavailable("delete", e))?;
        wtxn.commit().map_err(|e| unavailable("commit", e))?;
        Ok(deleted)
    }

    fn keys(&self) -> Result<Vec<String>, StorageUnavailable> {
        let rtxn = self.env.read_txn().map_err(|e| unavailable("read txn", e))?;
        let iter = self.db.iter(&rtxn).map_err(|e| unavailable("iter", e))?;

        let mut keys = Vec::new();
        for result in iter {
            match result {
                Ok((key, _)) => keys.push(key.to_string()),
                // Keys written by foreign tools may not be UTF-8; skip them.
                Err(_) => continue,
            }
        }
        Ok(keys)
    }

    fn flush(&self) -> Result<(), StorageUnavailable> {
        self.env.force_sync().map_err(|e| unavailable("sync", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_backend() -> (LmdbBackend, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let backend = LmdbBackend::open(temp_dir.path(), 10).expect("backend creation should succeed");
        (backend, temp_dir)
    }

    #[test]
    fn test_write_read_delete() {
        let (backend, _dir) = create_test_backend();
        backend.write("sinistro:marcas_v2", b"[]").unwrap();
        assert_eq!(backend.read("sinistro:marcas_v2").unwrap(), Some(b"[]".to_vec()));
        assert!(backend.delete("sinistro:marcas_v2").unwrap());
        assert_eq!(backend.read("sinistro:marcas_v2").unwrap(), None);
    }

    #[test]
    fn test_keys_lists_everything() {
        let (backend, _dir) = create_test_backend();
        backend.write("a", b"1").unwrap();
        backend.write("b", b"2").unwrap();
        let mut keys = backend.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_oversized_map_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        assert!(LmdbBackend::open(temp_dir.path(), usize::MAX).is_err());
        assert!(LmdbBackend::open(temp_dir.path(), 0).is_err());
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let backend = LmdbBackend::open(temp_dir.path(), 10).unwrap();
            backend.write("persisted", b"yes").unwrap();
            backend.flush().unwrap();
        }
        let backend = LmdbBackend::open(temp_dir.path(), 10).unwrap();
        assert_eq!(backend.read("persisted").unwrap(), Some(b"yes".to_vec()));
    }
}
