//! Identity and role records as read from the durable stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{RoleId, UserId};

/// A named privilege tier.
///
/// Levels form a total order: a higher `level` carries strictly more privilege
/// than a lower one. Roles are read-only to the admission path.
///
/// # Example
///
/// ```
/// use gatekeeper_storage::Role;
///
/// let moderator = Role::builder().id(2).name("moderator").level(5).build();
/// let admin = Role::builder().id(3).name("admin").level(10).build();
/// assert!(admin.outranks_or_equals(&moderator));
/// assert!(!moderator.outranks_or_equals(&admin));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct Role {
    /// Row id of the role.
    #[builder(into)]
    pub id: RoleId,

    /// Unique role name, the lookup key of [`RoleStore`](crate::RoleStore).
    #[builder(into)]
    pub name: String,

    /// Privilege level. Higher means more privilege.
    pub level: i32,

    /// Human readable description.
    #[builder(into, default)]
    pub description: String,
}

impl Role {
    /// Returns `true` if this role's level is at least `required`'s level.
    #[must_use]
    pub fn outranks_or_equals(&self, required: &Role) -> bool {
        self.level >= required.level
    }
}

/// A user account together with its eagerly resolved role.
///
/// This is the snapshot cached by the identity cache and handed to
/// authorization. It deliberately carries no credential material.
///
/// # Example
///
/// ```
/// use gatekeeper_storage::{Identity, Role};
///
/// let identity = Identity::builder()
///     .id(7)
///     .username("ana")
///     .email("ana@example.com")
///     .role(Role::builder().id(1).name("user").level(0).build())
///     .build();
///
/// assert!(identity.is_active);
/// assert!(identity.is_authenticatable());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    /// Account id. Zero is the "no account" placeholder.
    #[builder(into)]
    pub id: UserId,

    /// Unique username.
    #[builder(into)]
    pub username: String,

    /// Unique email address.
    #[builder(into)]
    pub email: String,

    /// When the account was created.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,

    /// Whether the account has been activated.
    #[builder(default = true)]
    pub is_active: bool,

    /// The account's role, resolved on fetch.
    pub role: Role,
}

impl Identity {
    /// Returns `true` if this identity may be treated as an authenticated
    /// principal: a real account id that is currently active.
    #[must_use]
    pub fn is_authenticatable(&self) -> bool {
        !self.id.is_placeholder() && self.is_active
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn admin() -> Role {
        Role::builder().id(3).name("admin").level(10).description("full access").build()
    }

    #[test]
    fn snapshot_serde_is_lossless() {
        let identity = Identity::builder()
            .id(42)
            .username("bo")
            .email("bo@example.com")
            .created_at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap())
            .is_active(true)
            .role(admin())
            .build();

        let json = serde_json::to_vec(&identity).unwrap();
        let back: Identity = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, identity);
        assert_eq!(back.role.level, 10);
        assert_eq!(back.role.description, "full access");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{"id":1,"name":"user","level":0,"description":"","password":"x"}"#;
        assert!(serde_json::from_str::<Role>(json).is_err());
    }

    #[test]
    fn placeholder_and_inactive_are_not_authenticatable() {
        let placeholder =
            Identity::builder().id(0).username("").email("").role(admin()).build();
        assert!(!placeholder.is_authenticatable());

        let inactive = Identity::builder()
            .id(5)
            .username("x")
            .email("x@example.com")
            .is_active(false)
            .role(admin())
            .build();
        assert!(!inactive.is_authenticatable());
    }

    #[test]
    fn equal_levels_satisfy_each_other() {
        let a = Role::builder().id(1).name("a").level(5).build();
        let b = Role::builder().id(2).name("b").level(5).build();
        assert!(a.outranks_or_equals(&b));
        assert!(b.outranks_or_equals(&a));
    }
}
