//! Ownership-or-role authorization.
//!
//! An identity may act on a resource it owns. Otherwise it needs a role at
//! least as privileged as the one the resource requires. Roles are looked up
//! fresh on every check; a failed lookup denies.

use std::{sync::Arc, time::Duration};

use gatekeeper_storage::{DEFAULT_STORE_TIMEOUT, Identity, RoleStore, UserId, with_timeout};
use tracing::{debug, warn};

use crate::error::{AdmissionError, AdmissionResult};

/// Decides whether an identity may act on a resource.
#[derive(Clone)]
pub struct Authorizer {
    roles: Arc<dyn RoleStore>,
    store_timeout: Duration,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer").field("store_timeout", &self.store_timeout).finish_non_exhaustive()
    }
}

#[bon::bon]
impl Authorizer {
    /// Creates an authorizer over `roles`.
    #[builder]
    pub fn new(
        roles: Arc<dyn RoleStore>,
        #[builder(default = DEFAULT_STORE_TIMEOUT)] store_timeout: Duration,
    ) -> Self {
        Self { roles, store_timeout }
    }

    /// Returns whether `identity` may act on a resource owned by `owner_id`
    /// that requires `required_role`.
    ///
    /// The owner is always allowed and no role lookup happens.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::RoleLookupFailed`] if `required_role` cannot
    /// be resolved, including when it does not exist.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.id, owner_id = %owner_id))]
    pub async fn authorize(
        &self,
        identity: &Identity,
        owner_id: UserId,
        required_role: &str,
    ) -> AdmissionResult<bool> {
        if identity.id == owner_id {
            debug!("owner access");
            return Ok(true);
        }

        let required = with_timeout(
            self.store_timeout,
            "role_store.get_by_name",
            self.roles.get_by_name(required_role),
        )
        .await
        .map_err(|source| {
            warn!(role = required_role, error = %source, "role lookup failed");
            AdmissionError::RoleLookupFailed { role: required_role.to_owned(), source }
        })?;

        Ok(identity.role.outranks_or_equals(&required))
    }
}
