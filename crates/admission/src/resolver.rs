//! Cache-aside identity resolution.
//!
//! On a hit the durable store is not touched. On a miss the store is read
//! under the per-operation timeout and a found identity is written back to
//! the cache. A not-found result is never cached.
//!
//! Failure policy:
//!
//! - A cache read failure fails the request; the store is not consulted.
//! - A cache write failure after a successful store read fails the request
//!   and is logged at `warn`.
//!
//! Cached identities may be up to one TTL stale.

use std::{sync::Arc, time::Duration};

use gatekeeper_storage::{
    DEFAULT_STORE_TIMEOUT, Identity, IdentityStore, StorageError, UserId, with_timeout,
};
use tracing::{debug, warn};

use crate::{
    cache::IdentityCache,
    error::{AdmissionError, AdmissionResult},
};

/// Resolves an account id to an [`Identity`].
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    cache: Option<IdentityCache>,
    store_timeout: Duration,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cache", &self.cache)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

#[bon::bon]
impl IdentityResolver {
    /// Creates a resolver.
    ///
    /// Without a `cache` every resolve goes straight to the store.
    #[builder]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        cache: Option<IdentityCache>,
        #[builder(default = DEFAULT_STORE_TIMEOUT)] store_timeout: Duration,
    ) -> Self {
        Self { store, cache, store_timeout }
    }

    /// Returns `true` if a cache sits in front of the store.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Resolves `id` through the cache, then the durable store.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::IdentityNotFound`] if the store has no active account with `id`
    /// - [`AdmissionError::BackendUnavailable`] if the cache or store fails or times out
    #[tracing::instrument(skip(self), fields(user_id = %id))]
    pub async fn resolve(&self, id: UserId) -> AdmissionResult<Identity> {
        let Some(cache) = &self.cache else {
            return self.fetch(id).await;
        };

        match cache.get(id).await {
            Ok(Some(identity)) => {
                debug!("identity served from cache");
                return Ok(identity);
            },
            Ok(None) => debug!("identity cache miss"),
            Err(e) => {
                warn!(error = %e, "identity cache read failed");
                return Err(AdmissionError::BackendUnavailable(e));
            },
        }

        let identity = self.fetch(id).await?;

        if let Err(e) = cache.set(&identity).await {
            warn!(error = %e, "identity cache write failed");
            return Err(AdmissionError::BackendUnavailable(e));
        }

        Ok(identity)
    }

    async fn fetch(&self, id: UserId) -> AdmissionResult<Identity> {
        with_timeout(self.store_timeout, "identity_store.get_by_id", self.store.get_by_id(id))
            .await
            .map_err(|e| match e {
                StorageError::NotFound { .. } => AdmissionError::IdentityNotFound { user_id: id },
                other => AdmissionError::BackendUnavailable(other),
            })
    }
}
