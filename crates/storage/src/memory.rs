//! In-memory cache service implementation.
//!
//! This module provides [`MemoryBackend`], an in-process implementation of
//! [`StorageBackend`] used when no external cache service is configured, and
//! in tests.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **TTL support**: Expired keys read as absent immediately; a background task removes them
//!   from memory
//! - **Tokio clock**: Expiry uses [`tokio::time::Instant`], so paused-time tests can advance
//!   past a TTL deterministically
//!
//! # Example
//!
//! ```
//! use gatekeeper_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"greeting".to_vec(), b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Entries are not shared between processes
//! - TTL cleanup runs every second, so memory reclamation is not precise (reads are)

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::{
    select,
    sync::watch,
    time::{Instant, sleep},
};

use crate::{backend::StorageBackend, error::StorageResult};

/// How often the background task sweeps expired keys.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Holds the shutdown signal sender. When dropped, the watch channel
/// closes and the cleanup task exits.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        // Sending is a best-effort signal; the receiver may already be gone.
        let _ = self.shutdown_tx.send(());
    }
}

/// A stored value together with its optional expiry.
#[derive(Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory cache service.
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data.
///
/// # Shutdown
///
/// The background TTL cleanup task holds only a weak view of the data and
/// stops automatically when all clones are dropped. You can also call
/// [`shutdown`](Self::shutdown) to stop it explicitly.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<HashMap<Vec<u8>, Entry>>>,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").field("entries", &self.data.read().len()).finish()
    }
}

impl MemoryBackend {
    /// Creates a new in-memory backend.
    ///
    /// This spawns a background task on the current tokio runtime that
    /// periodically removes expired keys.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let data = Arc::new(RwLock::new(HashMap::new()));

        // The sweeper only holds a weak reference so it never keeps the
        // map alive on its own.
        let weak = Arc::downgrade(&data);
        tokio::spawn(async move {
            Self::cleanup_expired_keys(weak, shutdown_rx).await;
        });

        Self { data, shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }) }
    }

    async fn cleanup_expired_keys(
        data: std::sync::Weak<RwLock<HashMap<Vec<u8>, Entry>>>,
        mut shutdown_rx: watch::Receiver<()>,
    ) {
        loop {
            select! {
                _ = sleep(CLEANUP_INTERVAL) => {}
                _ = shutdown_rx.changed() => {
                    return;
                }
            }

            let Some(data) = data.upgrade() else {
                return;
            };
            let now = Instant::now();
            let mut guard = data.write();
            let before = guard.len();
            guard.retain(|_, entry| !entry.is_expired(now));
            let removed = before - guard.len();
            if removed > 0 {
                tracing::trace!(removed, "swept expired cache entries");
            }
        }
    }

    /// Explicitly signals the background TTL cleanup task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_guard.shutdown_tx.send(());
    }

    /// Returns the number of physically stored entries, including expired
    /// entries the sweeper has not yet removed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let data = self.data.read();
        let now = Instant::now();
        Ok(data.get(key).filter(|entry| !entry.is_expired(now)).map(|entry| entry.value.clone()))
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.data.write().insert(key, Entry { value: Bytes::from(value), expires_at: None });
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len(), ttl_ms = ttl.as_millis() as u64))]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        let expires_at = Instant::now() + ttl;
        self.data
            .write()
            .insert(key, Entry { value: Bytes::from(value), expires_at: Some(expires_at) });
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let backend = MemoryBackend::new();
        backend.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert_eq!(backend.get(b"k").await.unwrap(), Some(Bytes::from("v")));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get(b"absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let backend = MemoryBackend::new();
        backend.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        backend.delete(b"k").await.unwrap();
        assert_eq!(backend.get(b"k").await.unwrap(), None);
        // Deleting again is a no-op.
        backend.delete(b"k").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_reads_as_absent() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl(b"k".to_vec(), b"v".to_vec(), Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(backend.get(b"k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(backend.get(b"k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_clears_previous_ttl() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl(b"k".to_vec(), b"v1".to_vec(), Duration::from_secs(1)).await.unwrap();
        backend.set(b"k".to_vec(), b"v2".to_vec()).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(backend.get(b"k").await.unwrap(), Some(Bytes::from("v2")));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_reclaims_expired_entries() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl(b"k".to_vec(), b"v".to_vec(), Duration::from_millis(10)).await.unwrap();
        assert_eq!(backend.len(), 1);

        // Let the sweeper run at least once past the expiry.
        tokio::time::sleep(CLEANUP_INTERVAL * 2).await;
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn clones_share_data() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert_eq!(clone.get(b"k").await.unwrap(), Some(Bytes::from("v")));
    }
}
