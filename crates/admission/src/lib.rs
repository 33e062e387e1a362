//! Request admission for the gatekeeper.
//!
//! Decides, per inbound request, whether it may proceed: a per-client
//! fixed-window rate limit, bearer token validation, cache-aside identity
//! resolution and an ownership-or-role authorization check.
//!
//! ```text
//! request ─▶ rate limit ─▶ token ─▶ identity ─▶ [authorize] ─▶ Admitted(Identity)
//!               │429         │401      │401         │403
//!               ▼            ▼         ▼            ▼
//!                          Rejected(Rejection)
//! ```
//!
//! Components are constructed explicitly and injected into
//! [`AdmissionPipeline`]; [`AdmissionConfig::build_pipeline`] wires them from
//! configuration.
//!
//! # Feature Flags
//!
//! - **`testutil`**: a manual clock and a fully wired pipeline fixture over in-memory stores.

#![deny(unsafe_code)]

pub mod authorization;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rate_limiter;
pub mod resolver;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use authorization::Authorizer;
pub use cache::{CacheConfig, IdentityCache};
pub use clock::{Clock, SystemClock};
pub use config::AdmissionConfig;
pub use error::{AdmissionError, AdmissionResult};
pub use pipeline::{
    AdmissionPipeline, AdmissionRequest, Decision, Rejection, RejectionStatus, ResourceScope,
};
pub use rate_limiter::{FixedWindowLimiter, RateLimitConfig, RateLimitMetricsSnapshot};
pub use resolver::IdentityResolver;
