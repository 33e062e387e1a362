//! Cache service trait definition.
//!
//! [`StorageBackend`] is the contract the identity cache is written against:
//! a generic key/value service over byte payloads with per-entry expiry.
//! Expiry is the backend's job; consumers never re-check timestamps.
//!
//! # Design Philosophy
//!
//! - **Keys and values are bytes**: no assumptions about serialization format
//! - **Async by default**: remote cache services are reached over the network
//! - **Single-key atomicity**: each `get`/`set` is atomic on its own; there are no multi-key
//!   operations, so consumers must not rely on cross-key consistency
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for the in-process
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Abstract cache service for key-value operations.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and support
/// concurrent operations from arbitrarily many callers.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair with no expiry |
/// | [`set_with_ttl`](StorageBackend::set_with_ttl) | Store with automatic expiration |
/// | [`delete`](StorageBackend::delete) | Remove a key |
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bytes::Bytes;
/// use gatekeeper_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend.set_with_ttl(b"user-1".to_vec(), b"{}".to_vec(), Duration::from_secs(60)).await.unwrap();
/// let value = backend.get(b"user-1").await.unwrap();
/// assert_eq!(value, Some(Bytes::from("{}")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists and has not expired
    /// - `Ok(None)` if the key doesn't exist or has expired
    /// - `Err(...)` on transport or service errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair with no expiry.
    ///
    /// If the key already exists, its value is overwritten and any previous
    /// TTL is cleared.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Stores a key-value pair that expires `ttl` after this call.
    ///
    /// Overwriting a key replaces both its value and its expiry.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()>;

    /// Deletes a key.
    ///
    /// If the key doesn't exist, this is a no-op (returns `Ok(())`).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;
}
