//! Shared test utilities for cache and store testing.
//!
//! This module provides fixture builders, instrumented store wrappers, and
//! assertion macros. It is feature-gated behind `testutil` to prevent leaking
//! into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! gatekeeper-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use gatekeeper_storage::testutil::{CountingIdentityStore, FailingBackend, identity_with_level};
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    StorageBackend,
    error::{StorageError, StorageResult},
    identity::{Identity, IdentityStore, Role, RoleStore},
    types::UserId,
};

/// Builds a role fixture.
#[must_use]
pub fn role(id: i64, name: &str, level: i32) -> Role {
    Role::builder().id(id).name(name).level(level).build()
}

/// Builds an active identity fixture whose role has the given level.
///
/// The username and email are derived from `id` so fixtures never collide.
#[must_use]
pub fn identity_with_level(id: i64, level: i32) -> Identity {
    Identity::builder()
        .id(id)
        .username(format!("user{id}"))
        .email(format!("user{id}@example.com"))
        .role(role(level.into(), &format!("level-{level}"), level))
        .build()
}

/// A [`StorageBackend`] whose operations can be made to fail on demand.
///
/// Reads and writes are controlled independently so tests can exercise
/// "read fails" and "write fails" policies separately. When no failure is
/// injected it behaves as an empty-by-default map without expiry.
#[derive(Debug, Default, Clone)]
pub struct FailingBackend {
    data: Arc<Mutex<std::collections::HashMap<Vec<u8>, Bytes>>>,
    read_failure: Arc<Mutex<Option<StorageError>>>,
    write_failure: Arc<Mutex<Option<StorageError>>>,
}

impl FailingBackend {
    /// Creates a backend with no injected failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `get` return `error` (or succeed again on `None`).
    pub fn fail_reads(&self, error: Option<StorageError>) {
        *self.read_failure.lock() = error;
    }

    /// Makes every subsequent `set`/`set_with_ttl`/`delete` return `error`.
    pub fn fail_writes(&self, error: Option<StorageError>) {
        *self.write_failure.lock() = error;
    }

    /// Stores raw bytes directly, bypassing injected failures.
    pub fn put_raw(&self, key: &[u8], value: &[u8]) {
        self.data.lock().insert(key.to_vec(), Bytes::copy_from_slice(value));
    }

    /// Returns the raw bytes stored under `key`, bypassing injected failures.
    #[must_use]
    pub fn raw(&self, key: &[u8]) -> Option<Bytes> {
        self.data.lock().get(key).cloned()
    }

    fn check_write(&self) -> StorageResult<()> {
        match self.write_failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageBackend for FailingBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        if let Some(error) = self.read_failure.lock().clone() {
            return Err(error);
        }
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.check_write()?;
        self.data.lock().insert(key, Bytes::from(value));
        Ok(())
    }

    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, _ttl: Duration) -> StorageResult<()> {
        self.set(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.check_write()?;
        self.data.lock().remove(key);
        Ok(())
    }
}

/// Wraps an [`IdentityStore`] and counts lookups.
///
/// Used to prove cache-aside behavior: a cache hit must not reach the
/// durable store.
#[derive(Debug)]
pub struct CountingIdentityStore<S> {
    inner: S,
    by_id: AtomicUsize,
    by_email: AtomicUsize,
}

impl<S> CountingIdentityStore<S> {
    /// Wraps `inner` with zeroed counters.
    pub fn new(inner: S) -> Self {
        Self { inner, by_id: AtomicUsize::new(0), by_email: AtomicUsize::new(0) }
    }

    /// Number of `get_by_id` calls so far.
    #[must_use]
    pub fn id_lookups(&self) -> usize {
        self.by_id.load(Ordering::SeqCst)
    }

    /// Number of `get_by_email` calls so far.
    #[must_use]
    pub fn email_lookups(&self) -> usize {
        self.by_email.load(Ordering::SeqCst)
    }

    /// Borrows the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: IdentityStore> IdentityStore for CountingIdentityStore<S> {
    async fn get_by_id(&self, id: UserId) -> StorageResult<Identity> {
        self.by_id.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(id).await
    }

    async fn get_by_email(&self, email: &str) -> StorageResult<Identity> {
        self.by_email.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_email(email).await
    }
}

/// Wraps a [`RoleStore`] and counts lookups.
///
/// Used to prove the ownership short-circuit never consults roles.
#[derive(Debug)]
pub struct CountingRoleStore<S> {
    inner: S,
    lookups: AtomicUsize,
}

impl<S> CountingRoleStore<S> {
    /// Wraps `inner` with a zeroed counter.
    pub fn new(inner: S) -> Self {
        Self { inner, lookups: AtomicUsize::new(0) }
    }

    /// Number of `get_by_name` calls so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: RoleStore> RoleStore for CountingRoleStore<S> {
    async fn get_by_name(&self, name: &str) -> StorageResult<Role> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_name(name).await
    }
}

/// A store whose every lookup sleeps for `delay` before answering.
///
/// With paused tokio time this deterministically drives a caller past its
/// per-operation timeout. Lookups that do complete return
/// [`StorageError::Connection`].
#[derive(Debug, Clone, Copy)]
pub struct StallingStore {
    delay: Duration,
}

impl StallingStore {
    /// Creates a store that stalls for `delay` on every call.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl IdentityStore for StallingStore {
    async fn get_by_id(&self, _id: UserId) -> StorageResult<Identity> {
        tokio::time::sleep(self.delay).await;
        Err(StorageError::connection("stalled identity store"))
    }

    async fn get_by_email(&self, _email: &str) -> StorageResult<Identity> {
        tokio::time::sleep(self.delay).await;
        Err(StorageError::connection("stalled identity store"))
    }
}

#[async_trait]
impl RoleStore for StallingStore {
    async fn get_by_name(&self, _name: &str) -> StorageResult<Role> {
        tokio::time::sleep(self.delay).await;
        Err(StorageError::connection("stalled role store"))
    }
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use gatekeeper_storage::assert_conflict;
/// use gatekeeper_storage::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::conflict("email taken"));
/// assert_conflict!(result);
/// ```
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict { .. })),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict { .. })),
            "{}: expected StorageError::Conflict, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "{}: expected StorageError::NotFound, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] contains a [`StorageError::Timeout`].
#[macro_export]
macro_rules! assert_timeout {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Timeout)),
            "expected StorageError::Timeout, got: {:?}",
            $result,
        );
    };
}
