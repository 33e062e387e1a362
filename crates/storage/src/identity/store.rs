//! Durable identity and role store contracts.
//!
//! The admission path only ever needs three lookups: an account by id, an
//! account by email, and a role by name. [`IdentityStore`] and [`RoleStore`]
//! expose exactly those. Production implementations wrap a database; the
//! in-memory implementations here back tests and local development.
//!
//! # Visibility
//!
//! Inactive accounts are invisible to lookups: a store reports them as
//! [`StorageError::NotFound`], the same as an id that was never created.
//!
//! # Usage
//!
//! ```
//! use gatekeeper_storage::{Identity, IdentityStore, MemoryIdentityStore, MemoryRoleStore, RoleStore, UserId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let roles = MemoryRoleStore::with_default_roles();
//!     let users = MemoryIdentityStore::new();
//!
//!     let role = roles.get_by_name("user").await?;
//!     let created = users.create_identity("ana", "ana@example.com", role).await?;
//!
//!     let fetched = users.get_by_id(created.id).await?;
//!     assert_eq!(fetched.username, "ana");
//!     assert!(users.get_by_id(UserId::from(999)).await.unwrap_err().is_not_found());
//!     Ok(())
//! }
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::{
    error::{StorageError, StorageResult},
    identity::{Identity, Role},
    types::{RoleId, UserId},
};

/// Read access to user accounts.
///
/// Lookups return the identity with its role already resolved.
///
/// # Errors
///
/// - [`StorageError::NotFound`] when no active account matches
/// - [`StorageError::Timeout`] / [`StorageError::Connection`] when the store is unreachable
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetches an active account by id.
    async fn get_by_id(&self, id: UserId) -> StorageResult<Identity>;

    /// Fetches an active account by email address.
    async fn get_by_email(&self, email: &str) -> StorageResult<Identity>;
}

/// Read access to roles.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Fetches a role by its unique name.
    ///
    /// Returns [`StorageError::NotFound`] if no role has that name.
    async fn get_by_name(&self, name: &str) -> StorageResult<Role>;
}

/// In-memory implementation of [`IdentityStore`].
///
/// Ids are assigned sequentially starting at 1, so the zero placeholder is
/// never handed out. Email and username are unique.
///
/// # Thread Safety
///
/// Uses [`parking_lot::RwLock`]; clones share the same accounts.
#[derive(Debug, Clone)]
pub struct MemoryIdentityStore {
    accounts: Arc<RwLock<HashMap<UserId, Identity>>>,
    next_id: Arc<AtomicI64>,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self { accounts: Arc::default(), next_id: Arc::new(AtomicI64::new(1)) }
    }
}

impl MemoryIdentityStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an active account with the next free id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the email or username is already
    /// taken (by an active or inactive account).
    #[tracing::instrument(skip(self, role), fields(role = %role.name))]
    pub async fn create_identity(
        &self,
        username: &str,
        email: &str,
        role: Role,
    ) -> StorageResult<Identity> {
        let mut accounts = self.accounts.write();

        if accounts.values().any(|existing| existing.email == email) {
            return Err(StorageError::conflict("a user with that email already exists"));
        }
        if accounts.values().any(|existing| existing.username == username) {
            return Err(StorageError::conflict("a user with that username already exists"));
        }

        // Ids seeded through `insert` are never handed out again.
        let mut id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
        while accounts.contains_key(&id) {
            id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
        }
        let identity = Identity {
            id,
            username: username.to_owned(),
            email: email.to_owned(),
            created_at: Utc::now(),
            is_active: true,
            role,
        };
        accounts.insert(id, identity.clone());
        Ok(identity)
    }

    /// Inserts or replaces an account verbatim, keeping its id.
    ///
    /// Bypasses uniqueness checks; intended for seeding fixtures. Later
    /// calls to [`create_identity`](Self::create_identity) allocate ids above
    /// any inserted one.
    pub fn insert(&self, identity: Identity) {
        let mut accounts = self.accounts.write();
        self.next_id.fetch_max(identity.id.0.saturating_add(1), Ordering::Relaxed);
        accounts.insert(identity.id, identity);
    }

    /// Activates or deactivates an account.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the id was never created.
    pub fn set_active(&self, id: UserId, active: bool) -> StorageResult<()> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&id).ok_or_else(|| StorageError::not_found(user_key(id)))?;
        account.is_active = active;
        Ok(())
    }

    /// Replaces the role of an account.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the id was never created.
    pub fn set_role(&self, id: UserId, role: Role) -> StorageResult<()> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&id).ok_or_else(|| StorageError::not_found(user_key(id)))?;
        account.role = role;
        Ok(())
    }

    /// Number of stored accounts, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Returns `true` if no accounts are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

fn user_key(id: UserId) -> String {
    format!("user-{id}")
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, id: UserId) -> StorageResult<Identity> {
        self.accounts
            .read()
            .get(&id)
            .filter(|identity| identity.is_active)
            .cloned()
            .ok_or_else(|| StorageError::not_found(user_key(id)))
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> StorageResult<Identity> {
        self.accounts
            .read()
            .values()
            .find(|identity| identity.is_active && identity.email == email)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("email {email}")))
    }
}

/// In-memory implementation of [`RoleStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryRoleStore {
    roles: Arc<RwLock<HashMap<String, Role>>>,
}

impl MemoryRoleStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the three built-in roles:
    ///
    /// | id | name | level |
    /// |----|------|-------|
    /// | 1 | `user` | 1 |
    /// | 2 | `moderator` | 2 |
    /// | 3 | `admin` | 3 |
    #[must_use]
    pub fn with_default_roles() -> Self {
        let store = Self::new();
        store.insert(
            Role::builder()
                .id(RoleId(1))
                .name("user")
                .level(1)
                .description("A user can create posts and comments")
                .build(),
        );
        store.insert(
            Role::builder()
                .id(RoleId(2))
                .name("moderator")
                .level(2)
                .description("A moderator can update other users posts")
                .build(),
        );
        store.insert(
            Role::builder()
                .id(RoleId(3))
                .name("admin")
                .level(3)
                .description("An admin can update and delete other users posts")
                .build(),
        );
        store
    }

    /// Inserts or replaces a role, keyed by name.
    pub fn insert(&self, role: Role) {
        self.roles.write().insert(role.name.clone(), role);
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    #[tracing::instrument(skip(self))]
    async fn get_by_name(&self, name: &str) -> StorageResult<Role> {
        self.roles
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("role {name}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn user_role() -> Role {
        Role::builder().id(1).name("user").level(1).build()
    }

    #[tokio::test]
    async fn ids_start_at_one() {
        let store = MemoryIdentityStore::new();
        let first = store.create_identity("a", "a@example.com", user_role()).await.unwrap();
        let second = store.create_identity("b", "b@example.com", user_role()).await.unwrap();
        assert_eq!(first.id, UserId(1));
        assert_eq!(second.id, UserId(2));
    }

    #[tokio::test]
    async fn created_ids_skip_inserted_accounts() {
        let store = MemoryIdentityStore::new();
        let seeded = Identity::builder()
            .id(1)
            .username("seeded")
            .email("seeded@example.com")
            .role(user_role())
            .build();
        store.insert(seeded);

        let fresh = store.create_identity("fresh", "fresh@example.com", user_role()).await.unwrap();
        assert_eq!(fresh.id, UserId(2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_by_id(UserId(1)).await.unwrap().username, "seeded");
        assert_eq!(store.get_by_id(UserId(2)).await.unwrap().username, "fresh");
    }

    #[tokio::test]
    async fn created_ids_jump_past_sparse_inserts() {
        let store = MemoryIdentityStore::new();
        let mut seeded = store.create_identity("a", "a@example.com", user_role()).await.unwrap();
        seeded.id = UserId(10);
        seeded.username = "ten".to_owned();
        seeded.email = "ten@example.com".to_owned();
        store.insert(seeded);

        let next = store.create_identity("b", "b@example.com", user_role()).await.unwrap();
        assert_eq!(next.id, UserId(11));
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryIdentityStore::new();
        store.create_identity("a", "same@example.com", user_role()).await.unwrap();
        let err = store.create_identity("b", "same@example.com", user_role()).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { ref message } if message.contains("email")));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryIdentityStore::new();
        store.create_identity("same", "a@example.com", user_role()).await.unwrap();
        let err = store.create_identity("same", "b@example.com", user_role()).await.unwrap_err();
        assert!(
            matches!(err, StorageError::Conflict { ref message } if message.contains("username"))
        );
    }

    #[tokio::test]
    async fn inactive_accounts_are_not_found() {
        let store = MemoryIdentityStore::new();
        let created = store.create_identity("a", "a@example.com", user_role()).await.unwrap();
        store.set_active(created.id, false).unwrap();

        assert!(store.get_by_id(created.id).await.unwrap_err().is_not_found());
        assert!(store.get_by_email("a@example.com").await.unwrap_err().is_not_found());

        store.set_active(created.id, true).unwrap();
        assert_eq!(store.get_by_id(created.id).await.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn set_active_on_unknown_id_is_not_found() {
        let store = MemoryIdentityStore::new();
        assert!(store.set_active(UserId(77), false).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn lookups_resolve_role_eagerly() {
        let roles = MemoryRoleStore::with_default_roles();
        let store = MemoryIdentityStore::new();
        let admin = roles.get_by_name("admin").await.unwrap();
        let created = store.create_identity("root", "root@example.com", admin).await.unwrap();

        let fetched = store.get_by_email("root@example.com").await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.role.name, "admin");
        assert_eq!(fetched.role.level, 3);
    }

    #[tokio::test]
    async fn default_roles_are_ordered() {
        let roles = MemoryRoleStore::with_default_roles();
        let user = roles.get_by_name("user").await.unwrap();
        let moderator = roles.get_by_name("moderator").await.unwrap();
        let admin = roles.get_by_name("admin").await.unwrap();
        assert!(user.level < moderator.level);
        assert!(moderator.level < admin.level);
        assert!(roles.get_by_name("superuser").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let store: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new());
        assert!(store.get_by_id(UserId(1)).await.unwrap_err().is_not_found());
    }
}
