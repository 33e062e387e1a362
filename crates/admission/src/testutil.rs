//! Shared test utilities for the admission crate.
//!
//! Feature-gated behind `testutil`. Provides a manually driven [`Clock`] and
//! a fully wired [`PipelineFixture`] over in-memory stores.
//!
//! ```toml
//! [dev-dependencies]
//! gatekeeper-admission = { path = "../admission", features = ["testutil"] }
//! ```

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use gatekeeper_authn::{TokenAuthenticator, testutil::test_authenticator};
use gatekeeper_storage::{
    Identity, IdentityStore, MemoryIdentityStore, MemoryRoleStore, RoleStore, UserId,
};
use parking_lot::Mutex;

use crate::{
    authorization::Authorizer,
    cache::IdentityCache,
    clock::Clock,
    pipeline::{AdmissionPipeline, AdmissionRequest},
    rate_limiter::{FixedWindowLimiter, RateLimitConfig},
    resolver::IdentityResolver,
};

/// A clock that only moves when told to.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self { now: Arc::new(Mutex::new(Instant::now())) }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Sets the clock to `to`.
    pub fn set(&self, to: Instant) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Builds a limiter on `clock`.
#[must_use]
pub fn manual_limiter(limit: u64, window: Duration, clock: &ManualClock) -> Arc<FixedWindowLimiter> {
    Arc::new(FixedWindowLimiter::with_clock(RateLimitConfig::new(limit, window), Arc::new(clock.clone())))
}

/// A pipeline over in-memory stores with the default role hierarchy and two
/// seeded accounts: `user` (role `user`) and `admin` (role `admin`).
#[derive(Debug)]
pub struct PipelineFixture {
    /// The identity store behind the resolver.
    pub users: Arc<MemoryIdentityStore>,
    /// The role store behind the authorizer.
    pub roles: Arc<MemoryRoleStore>,
    /// Token issuer sharing the pipeline's secret.
    pub authenticator: Arc<TokenAuthenticator>,
    /// Drives the limiter, if one was configured.
    pub clock: ManualClock,
    /// The wired pipeline.
    pub pipeline: AdmissionPipeline,
    /// Account with the `user` role.
    pub user: Identity,
    /// Account with the `admin` role.
    pub admin: Identity,
}

impl PipelineFixture {
    /// Fixture with no rate limiter and no cache.
    pub async fn new() -> Self {
        Self::build(None, None).await
    }

    /// Fixture with a `limit` per `window` limiter on a [`ManualClock`].
    pub async fn with_rate_limit(limit: u64, window: Duration) -> Self {
        Self::build(Some((limit, window)), None).await
    }

    /// Fixture with an identity cache in front of the store.
    pub async fn with_cache(cache: IdentityCache) -> Self {
        Self::build(None, Some(cache)).await
    }

    /// Builds the fixture.
    ///
    /// # Panics
    ///
    /// Panics if seeding the in-memory stores fails.
    #[allow(clippy::expect_used)]
    pub async fn build(rate_limit: Option<(u64, Duration)>, cache: Option<IdentityCache>) -> Self {
        let roles = Arc::new(MemoryRoleStore::with_default_roles());
        let users = Arc::new(MemoryIdentityStore::new());

        let user_role = roles.get_by_name("user").await.expect("default user role");
        let admin_role = roles.get_by_name("admin").await.expect("default admin role");
        let user = users
            .create_identity("ana", "ana@example.com", user_role)
            .await
            .expect("seed user");
        let admin = users
            .create_identity("root", "root@example.com", admin_role)
            .await
            .expect("seed admin");

        let clock = ManualClock::new();
        let limiter = rate_limit.map(|(limit, window)| manual_limiter(limit, window, &clock));
        let authenticator = Arc::new(test_authenticator());

        let store: Arc<dyn IdentityStore> = users.clone();
        let pipeline = AdmissionPipeline::builder()
            .maybe_limiter(limiter)
            .authenticator(authenticator.clone())
            .resolver(IdentityResolver::builder().store(store).maybe_cache(cache).build())
            .authorizer(Authorizer::builder().roles(roles.clone()).build())
            .build();

        Self { users, roles, authenticator, clock, pipeline, user, admin }
    }

    /// Issues a token for `user_id`.
    ///
    /// # Panics
    ///
    /// Panics if signing fails.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn token_for(&self, user_id: UserId) -> String {
        self.authenticator.issue_for(user_id).expect("signing with the test secret")
    }

    /// An unscoped request from client `"client"` bearing a token for `user_id`.
    #[must_use]
    pub fn request_as(&self, user_id: UserId) -> AdmissionRequest {
        AdmissionRequest::new("client", Some(format!("Bearer {}", self.token_for(user_id))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.now(), start + Duration::from_secs(3));

        let shared = clock.clone();
        shared.set(start);
        assert_eq!(clock.now(), start);
    }
}
