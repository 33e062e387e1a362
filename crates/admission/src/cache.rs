//! Identity snapshots in a TTL cache service.
//!
//! [`IdentityCache`] stores [`Identity`] values as JSON under `user-{id}` in
//! any [`StorageBackend`]. Expiry is delegated to the backend via
//! [`set_with_ttl`](StorageBackend::set_with_ttl); an absent or expired entry
//! reads as `None`, and only transport or decoding failures are errors.
//!
//! # Usage
//!
//! ```
//! # use std::{sync::Arc, time::Duration};
//! # use gatekeeper_admission::cache::{CacheConfig, IdentityCache};
//! # use gatekeeper_storage::{Identity, MemoryBackend, Role};
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let config = CacheConfig::builder().ttl(Duration::from_secs(30)).build().unwrap();
//! let cache = IdentityCache::new(Arc::new(MemoryBackend::new()), &config);
//!
//! let identity = Identity::builder()
//!     .id(7)
//!     .username("ana")
//!     .email("ana@example.com")
//!     .role(Role::builder().id(1).name("user").level(0).build())
//!     .build();
//! cache.set(&identity).await.unwrap();
//! assert_eq!(cache.get(7.into()).await.unwrap(), Some(identity));
//! # });
//! ```

use std::{sync::Arc, time::Duration};

use gatekeeper_storage::{ConfigError, Identity, StorageBackend, StorageError, StorageResult, UserId};
use tracing::trace;

/// Default cache TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Minimum allowed cache TTL.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Configuration for the identity cache.
///
/// # Validation
///
/// - `ttl` must be >= 1 second
///
/// Use [`CacheConfig::disabled()`] to resolve every identity from the durable
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    ttl: Duration,
    enabled: bool,
}

impl CacheConfig {
    /// Starts a validated cache configuration.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder { ttl: DEFAULT_TTL }
    }

    /// Creates a disabled cache configuration.
    pub fn disabled() -> Self {
        Self { ttl: Duration::ZERO, enabled: false }
    }

    /// Returns the cache TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns whether caching is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL, enabled: true }
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug)]
pub struct CacheConfigBuilder {
    ttl: Duration,
}

impl CacheConfigBuilder {
    /// Sets the TTL for cache entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builds the [`CacheConfig`], validating all fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `ttl` is less than 1 second.
    pub fn build(self) -> Result<CacheConfig, ConfigError> {
        if self.ttl < MIN_TTL {
            return Err(ConfigError::BelowMinimum {
                field: "ttl",
                value: format!("{}ms", self.ttl.as_millis()),
                min: "1s".to_owned(),
            });
        }
        Ok(CacheConfig { ttl: self.ttl, enabled: true })
    }
}

/// Cache key for an identity.
#[must_use]
pub fn cache_key(id: UserId) -> Vec<u8> {
    format!("user-{id}").into_bytes()
}

/// TTL cache of identity snapshots over a [`StorageBackend`].
#[derive(Clone)]
pub struct IdentityCache {
    backend: Arc<dyn StorageBackend>,
    ttl: Duration,
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl IdentityCache {
    /// Creates a cache writing entries with `config`'s TTL.
    ///
    /// The caller decides whether a cache exists at all; a disabled config is
    /// expressed by not constructing one (see
    /// [`IdentityResolver`](crate::resolver::IdentityResolver)).
    pub fn new(backend: Arc<dyn StorageBackend>, config: &CacheConfig) -> Self {
        Self { backend, ttl: config.ttl }
    }

    /// Returns the TTL applied to new entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reads a cached identity.
    ///
    /// # Errors
    ///
    /// Returns the backend's error on transport failure, or
    /// [`StorageError::Serialization`] if the stored payload does not decode.
    #[tracing::instrument(skip(self), fields(user_id = %id))]
    pub async fn get(&self, id: UserId) -> StorageResult<Option<Identity>> {
        let Some(bytes) = self.backend.get(&cache_key(id)).await? else {
            trace!("identity cache miss");
            return Ok(None);
        };

        let identity = serde_json::from_slice::<Identity>(&bytes).map_err(|e| {
            StorageError::serialization_with_source("cached identity payload is corrupt", e)
        })?;
        trace!("identity cache hit");
        Ok(Some(identity))
    }

    /// Stores `identity` under its id with the configured TTL.
    ///
    /// An identity with the placeholder id is never cached; the call succeeds
    /// without touching the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the write fails.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.id))]
    pub async fn set(&self, identity: &Identity) -> StorageResult<()> {
        if identity.id.is_placeholder() {
            return Ok(());
        }

        let payload = serde_json::to_vec(identity)
            .map_err(|e| StorageError::serialization_with_source("failed to encode identity", e))?;
        self.backend.set_with_ttl(cache_key(identity.id), payload, self.ttl).await
    }

    /// Removes a cached identity so the next resolve reads the durable store.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the delete fails.
    #[tracing::instrument(skip(self), fields(user_id = %id))]
    pub async fn invalidate(&self, id: UserId) -> StorageResult<()> {
        self.backend.delete(&cache_key(id)).await
    }
}
