//! Configuration for the admission pipeline.
//!
//! [`AdmissionConfig`] deserializes from any serde format, with durations in
//! humantime notation (`"5s"`, `"48h"`). Every field has a default except the
//! token secret. [`AdmissionConfig::from_env`] overlays the deployment's
//! environment variables on the defaults.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use gatekeeper_admission::AdmissionConfig;
//!
//! let config: AdmissionConfig = serde_json::from_str(r#"{
//!     "rate_limit": { "requests": 100, "window": "1m" },
//!     "cache": { "enabled": true },
//!     "token": { "secret": "s3cret" }
//! }"#).unwrap();
//!
//! assert_eq!(config.rate_limit.window, Duration::from_secs(60));
//! assert_eq!(config.cache.ttl, Duration::from_secs(60));
//! config.validate().unwrap();
//! ```

use std::{sync::Arc, time::Duration};

use gatekeeper_authn::{BasicCredentials, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL, TokenAuthenticator};
use gatekeeper_storage::{
    ConfigError, DEFAULT_STORE_TIMEOUT, IdentityStore, RoleStore, StorageBackend,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    authorization::Authorizer,
    cache::{CacheConfig, IdentityCache},
    pipeline::AdmissionPipeline,
    rate_limiter::{DEFAULT_REQUESTS_PER_WINDOW, DEFAULT_WINDOW, FixedWindowLimiter, RateLimitConfig},
    resolver::IdentityResolver,
};

/// Requests per window.
pub const ENV_RATE_LIMIT_REQUESTS: &str = "RATELIMITER_REQUEST_COUNT";
/// Whether rate limiting is on.
pub const ENV_RATE_LIMIT_ENABLED: &str = "RATELIMITER_REQUEST";
/// Whether the identity cache is on.
pub const ENV_CACHE_ENABLED: &str = "REDIS_ENABLED";
/// Token signing secret.
pub const ENV_TOKEN_SECRET: &str = "AUTH_TOKEN_SECRETS";
/// Operator basic-auth user.
pub const ENV_BASIC_USER: &str = "AUTH_BASIC_USER";
/// Operator basic-auth password.
pub const ENV_BASIC_PASS: &str = "AUTH_BASIC_PASS";

/// Top-level admission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Per-client rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitSection,

    /// Identity cache.
    #[serde(default)]
    pub cache: CacheSection,

    /// Bearer token settings.
    #[serde(default)]
    pub token: TokenSection,

    /// Operator basic-auth credentials.
    #[serde(default)]
    pub basic: BasicSection,

    /// Upper bound on each durable store call.
    #[serde(with = "humantime_serde", default = "default_store_timeout")]
    pub store_timeout: Duration,
}

/// Rate limit settings.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    /// Skip the rate limit stage entirely when `false`.
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub enabled: bool,

    /// Requests admitted per client per window.
    #[serde(default = "default_requests")]
    #[builder(default = DEFAULT_REQUESTS_PER_WINDOW)]
    pub requests: u64,

    /// Window length.
    #[serde(with = "humantime_serde", default = "default_window")]
    #[builder(default = DEFAULT_WINDOW)]
    pub window: Duration,
}

/// Identity cache settings.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Put a cache in front of the identity store.
    #[serde(default)]
    #[builder(default)]
    pub enabled: bool,

    /// Entry lifetime.
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    #[builder(default = crate::cache::DEFAULT_TTL)]
    pub ttl: Duration,
}

/// Token settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSection {
    /// HS256 signing secret. Required.
    #[serde(default)]
    pub secret: Zeroizing<String>,

    /// Issuer and audience.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Lifetime of issued tokens.
    #[serde(with = "humantime_serde", default = "default_token_ttl")]
    pub ttl: Duration,
}

impl std::fmt::Debug for TokenSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSection")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Basic-auth settings for operator endpoints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicSection {
    /// Expected user.
    #[serde(default = "default_basic")]
    pub user: String,

    /// Expected password.
    #[serde(default = "default_basic_pass")]
    pub pass: Zeroizing<String>,
}

impl std::fmt::Debug for BasicSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicSection").field("user", &self.user).field("pass", &"[REDACTED]").finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_requests() -> u64 {
    DEFAULT_REQUESTS_PER_WINDOW
}

fn default_window() -> Duration {
    DEFAULT_WINDOW
}

fn default_cache_ttl() -> Duration {
    crate::cache::DEFAULT_TTL
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_owned()
}

fn default_token_ttl() -> Duration {
    DEFAULT_TOKEN_TTL
}

fn default_basic() -> String {
    "admin".to_owned()
}

fn default_basic_pass() -> Zeroizing<String> {
    Zeroizing::new(default_basic())
}

fn default_store_timeout() -> Duration {
    DEFAULT_STORE_TIMEOUT
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitSection::default(),
            cache: CacheSection::default(),
            token: TokenSection::default(),
            basic: BasicSection::default(),
            store_timeout: default_store_timeout(),
        }
    }
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self { enabled: true, requests: default_requests(), window: default_window() }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { enabled: false, ttl: default_cache_ttl() }
    }
}

impl Default for TokenSection {
    fn default() -> Self {
        Self { secret: Zeroizing::default(), issuer: default_issuer(), ttl: default_token_ttl() }
    }
}

impl Default for BasicSection {
    fn default() -> Self {
        Self { user: default_basic(), pass: default_basic_pass() }
    }
}

impl AdmissionConfig {
    /// Reads configuration from the process environment over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but does not
    /// parse. Missing variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_RATE_LIMIT_REQUESTS) {
            config.rate_limit.requests = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid { field: ENV_RATE_LIMIT_REQUESTS, message: e.to_string() }
            })?;
        }
        if let Some(raw) = lookup(ENV_RATE_LIMIT_ENABLED) {
            config.rate_limit.enabled = parse_bool(ENV_RATE_LIMIT_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CACHE_ENABLED) {
            config.cache.enabled = parse_bool(ENV_CACHE_ENABLED, &raw)?;
        }
        if let Some(secret) = lookup(ENV_TOKEN_SECRET) {
            config.token.secret = Zeroizing::new(secret);
        }
        if let Some(user) = lookup(ENV_BASIC_USER) {
            config.basic.user = user;
        }
        if let Some(pass) = lookup(ENV_BASIC_PASS) {
            config.basic.pass = Zeroizing::new(pass);
        }

        Ok(config)
    }

    /// Checks every field against its accepted range.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::BelowMinimum`] for zero requests, a zero window, a cache TTL under one
    ///   second, or a zero store timeout
    /// - [`ConfigError::Missing`] for an empty token secret
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_rate_limit()?;
        if self.cache.enabled {
            CacheConfig::builder().ttl(self.cache.ttl).build().map_err(|e| match e {
                ConfigError::BelowMinimum { value, min, .. } => {
                    ConfigError::BelowMinimum { field: "cache.ttl", value, min }
                },
                other => other,
            })?;
        }
        if self.token.secret.is_empty() {
            return Err(ConfigError::Missing { field: "token.secret" });
        }
        if self.store_timeout.is_zero() {
            return Err(ConfigError::BelowMinimum {
                field: "store_timeout",
                value: "0s".to_owned(),
                min: "1ns".to_owned(),
            });
        }
        Ok(())
    }

    fn validate_rate_limit(&self) -> Result<(), ConfigError> {
        if self.rate_limit.requests == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "rate_limit.requests",
                value: "0".to_owned(),
                min: "1".to_owned(),
            });
        }
        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::BelowMinimum {
                field: "rate_limit.window",
                value: "0s".to_owned(),
                min: "1ns".to_owned(),
            });
        }
        Ok(())
    }

    /// The limiter this configuration describes, or `None` when disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the rate limit section is invalid.
    pub fn rate_limiter(&self) -> Result<Option<FixedWindowLimiter>, ConfigError> {
        if !self.rate_limit.enabled {
            return Ok(None);
        }
        self.validate_rate_limit()?;
        Ok(Some(FixedWindowLimiter::new(RateLimitConfig::new(
            self.rate_limit.requests,
            self.rate_limit.window,
        ))))
    }

    /// Expected operator credentials.
    #[must_use]
    pub fn basic_credentials(&self) -> BasicCredentials {
        BasicCredentials::new(self.basic.user.clone(), self.basic.pass.as_str())
    }

    /// The token authenticator this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the token section is invalid.
    pub fn authenticator(&self) -> Result<TokenAuthenticator, ConfigError> {
        TokenAuthenticator::builder()
            .secret(self.token.secret.as_bytes().to_vec())
            .issuer(self.token.issuer.clone())
            .ttl(self.token.ttl)
            .build()
    }

    /// Wires a pipeline from this configuration and the given stores.
    ///
    /// `cache_backend` is only used when the cache is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn build_pipeline(
        &self,
        users: Arc<dyn IdentityStore>,
        roles: Arc<dyn RoleStore>,
        cache_backend: Arc<dyn StorageBackend>,
    ) -> Result<AdmissionPipeline, ConfigError> {
        self.validate()?;

        let cache = if self.cache.enabled {
            let config = CacheConfig::builder().ttl(self.cache.ttl).build()?;
            Some(IdentityCache::new(cache_backend, &config))
        } else {
            None
        };

        let resolver = IdentityResolver::builder()
            .store(users)
            .maybe_cache(cache)
            .store_timeout(self.store_timeout)
            .build();
        let authorizer = Authorizer::builder().roles(roles).store_timeout(self.store_timeout).build();

        Ok(AdmissionPipeline::builder()
            .maybe_limiter(self.rate_limiter()?.map(Arc::new))
            .authenticator(Arc::new(self.authenticator()?))
            .resolver(resolver)
            .authorizer(authorizer)
            .build())
    }
}

fn parse_bool(field: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        other => Err(ConfigError::Invalid { field, message: format!("not a boolean: {other:?}") }),
    }
}
