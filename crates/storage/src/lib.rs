//! Storage contracts for the gatekeeper admission pipeline.
//!
//! This crate provides the two kinds of storage the pipeline consumes:
//!
//! - a **cache service** ([`StorageBackend`]): byte keys, byte values, per-entry TTL
//! - **durable stores** ([`IdentityStore`], [`RoleStore`]): the system of record for accounts
//!   and roles, reached through narrow lookup capabilities
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  gatekeeper-admission                       │
//! │     IdentityCache │ IdentityResolver │ Authorizer            │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  StorageBackend (cache)      │  IdentityStore / RoleStore   │
//! │  get, set_with_ttl, delete   │  get_by_id, get_by_name      │
//! ├──────────────────────────────┼──────────────────────────────┤
//! │  MemoryBackend               │  MemoryIdentityStore         │
//! │  (in-process, TTL sweep)     │  MemoryRoleStore             │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use gatekeeper_storage::{IdentityStore, MemoryIdentityStore, MemoryRoleStore, RoleStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let roles = MemoryRoleStore::with_default_roles();
//!     let users = MemoryIdentityStore::new();
//!
//!     let moderator = roles.get_by_name("moderator").await?;
//!     let created = users.create_identity("mia", "mia@example.com", moderator).await?;
//!
//!     let identity = users.get_by_id(created.id).await?;
//!     assert_eq!(identity.role.name, "moderator");
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. "Record absent" and "unique
//! field taken" are the distinct variants [`StorageError::NotFound`] and
//! [`StorageError::Conflict`]; everything else is a backend failure.
//! Durable calls are bounded with [`timeout::with_timeout`].
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared test helpers (fixtures, failing
//!   cache backends, counting and stalling stores, assertion macros). Enable this in
//!   `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod identity;
pub mod memory;
pub mod timeout;
pub mod types;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use backend::StorageBackend;
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use identity::{
    Identity, IdentityStore, MemoryIdentityStore, MemoryRoleStore, Role, RoleStore,
};
pub use memory::MemoryBackend;
pub use timeout::{DEFAULT_STORE_TIMEOUT, with_timeout};
pub use types::{RoleId, UserId};
