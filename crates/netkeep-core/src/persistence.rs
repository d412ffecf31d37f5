//! Persistent key-value storage abstraction.
//!
//! The credential store writes a single blob under one key of a namespaced
//! key-value store. Each platform provides its own implementation:
//! - Linux: one file per namespace/key
//! - ESP32: NVS (Non-Volatile Storage)
//!
//! A session is opened with [`Persistence::begin`] and closed by dropping it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Errors reported by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be opened.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Reading a key failed.
    #[error("Read error: {0}")]
    ReadError(String),

    /// Writing a key failed.
    #[error("Write error: {0}")]
    WriteError(String),

    /// The store accepted fewer bytes than requested.
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

/// An open namespace of the key-value store.
///
/// Dropping the session ends it.
pub trait PersistenceSession {
    /// Length of the value stored under `key`, or `None` if it is absent.
    fn get_length(&self, key: &str) -> Result<Option<usize>, StoreError>;

    /// Copy at most `buf.len()` bytes of the value under `key` into `buf`.
    ///
    /// Returns the number of bytes copied. A value longer than `buf` must be
    /// truncated to its prefix, never reported as an error.
    fn get_bytes(&self, key: &str, buf: &mut [u8]) -> Result<usize, StoreError>;

    /// Store `data` under `key`, returning the number of bytes written.
    fn put_bytes(&mut self, key: &str, data: &[u8]) -> Result<usize, StoreError>;
}

/// A namespaced key-value byte store.
pub trait Persistence: Send {
    /// Open `namespace`. Read-only sessions reject `put_bytes`.
    fn begin(
        &self,
        namespace: &str,
        read_only: bool,
    ) -> Result<Box<dyn PersistenceSession + '_>, StoreError>;
}

/// Copy the longest prefix of `value` that fits in `buf`.
pub fn copy_prefix(value: &[u8], buf: &mut [u8]) -> usize {
    let n = value.len().min(buf.len());
    buf[..n].copy_from_slice(&value[..n]);
    n
}

#[derive(Debug, Default)]
struct MemoryInner {
    data: Mutex<HashMap<(String, String), Vec<u8>>>,
    unavailable: AtomicBool,
    write_limit: Mutex<Option<usize>>,
    writes: AtomicUsize,
}

/// In-memory persistence.
///
/// Clones share the same backing map, which lets tests inspect what a store
/// wrote. Failure injection covers an unavailable store and short writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<MemoryInner>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `begin` fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Cap the number of bytes a single `put_bytes` accepts.
    pub fn limit_writes(&self, limit: Option<usize>) {
        *self
            .inner
            .write_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = limit;
    }

    /// Number of successful `put_bytes` calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Raw value under `namespace`/`key`.
    pub fn raw(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    /// Seed a raw value, bypassing the session API.
    pub fn insert_raw(&self, namespace: &str, key: &str, bytes: Vec<u8>) {
        self.inner
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((namespace.to_string(), key.to_string()), bytes);
    }
}

impl Persistence for MemoryPersistence {
    fn begin(
        &self,
        namespace: &str,
        read_only: bool,
    ) -> Result<Box<dyn PersistenceSession + '_>, StoreError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "namespace '{}' cannot be opened",
                namespace
            )));
        }
        Ok(Box::new(MemorySession {
            inner: self.inner.as_ref(),
            namespace: namespace.to_string(),
            read_only,
        }))
    }
}

struct MemorySession<'a> {
    inner: &'a MemoryInner,
    namespace: String,
    read_only: bool,
}

impl MemorySession<'_> {
    fn key(&self, key: &str) -> (String, String) {
        (self.namespace.clone(), key.to_string())
    }
}

impl PersistenceSession for MemorySession<'_> {
    fn get_length(&self, key: &str) -> Result<Option<usize>, StoreError> {
        let data = self.inner.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(data.get(&self.key(key)).map(Vec::len))
    }

    fn get_bytes(&self, key: &str, buf: &mut [u8]) -> Result<usize, StoreError> {
        let data = self.inner.data.lock().unwrap_or_else(|e| e.into_inner());
        let value = data
            .get(&self.key(key))
            .ok_or_else(|| StoreError::ReadError(format!("key '{}' not found", key)))?;
        Ok(copy_prefix(value, buf))
    }

    fn put_bytes(&mut self, key: &str, data: &[u8]) -> Result<usize, StoreError> {
        if self.read_only {
            return Err(StoreError::WriteError(format!(
                "namespace '{}' opened read-only",
                self.namespace
            )));
        }
        let limit = *self
            .inner
            .write_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let n = limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.inner
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(self.key(key), data[..n].to_vec());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let store = MemoryPersistence::new();
        {
            let mut session = store.begin("wifi", false).unwrap();
            assert_eq!(session.put_bytes("blob", &[1, 2, 3]).unwrap(), 3);
        }

        let session = store.begin("wifi", true).unwrap();
        assert_eq!(session.get_length("blob").unwrap(), Some(3));

        let mut buf = [0u8; 2];
        assert_eq!(session.get_bytes("blob", &mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
    }

    #[test]
    fn test_copy_prefix_truncates_long_values() {
        let mut buf = [0u8; 4];
        assert_eq!(copy_prefix(&[1, 2, 3, 4, 5, 6], &mut buf), 4);
        assert_eq!(buf, [1, 2, 3, 4]);

        let mut buf = [0u8; 4];
        assert_eq!(copy_prefix(&[7, 8], &mut buf), 2);
        assert_eq!(buf, [7, 8, 0, 0]);
    }

    #[test]
    fn test_namespaces_are_separate() {
        let store = MemoryPersistence::new();
        store.insert_raw("a", "blob", vec![9]);

        let session = store.begin("b", true).unwrap();
        assert_eq!(session.get_length("blob").unwrap(), None);
    }

    #[test]
    fn test_read_only_rejects_put() {
        let store = MemoryPersistence::new();
        let mut session = store.begin("wifi", true).unwrap();
        assert!(matches!(
            session.put_bytes("blob", &[1]),
            Err(StoreError::WriteError(_))
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_unavailable_begin_fails() {
        let store = MemoryPersistence::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.begin("wifi", true),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_write_limit_truncates() {
        let store = MemoryPersistence::new();
        store.limit_writes(Some(2));

        let mut session = store.begin("wifi", false).unwrap();
        assert_eq!(session.put_bytes("blob", &[1, 2, 3, 4]).unwrap(), 2);
        drop(session);

        assert_eq!(store.raw("wifi", "blob"), Some(vec![1, 2]));
    }
}
