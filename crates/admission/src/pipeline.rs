//! The admission pipeline.
//!
//! A request moves through up to four stages, stopping at the first failure:
//!
//! | Stage | Rejects with |
//! |-------|--------------|
//! | rate limit (skipped when no limiter is configured) | 429 |
//! | token validation | 401 |
//! | identity resolution | 401 |
//! | authorization (only for resource-scoped requests) | 403 |
//!
//! Nothing is retried. The resolved [`Identity`] is only handed out on
//! [`Decision::Admitted`]. Each stage is also exposed on its own so a handler
//! can authenticate up front and authorize later, passing the identity along
//! explicitly.
//!
//! # Example
//!
//! ```
//! # use std::{sync::Arc, time::Duration};
//! # use gatekeeper_admission::{
//! #     AdmissionPipeline, AdmissionRequest, Authorizer, Decision, FixedWindowLimiter,
//! #     IdentityResolver, RateLimitConfig, RejectionStatus,
//! # };
//! # use gatekeeper_authn::TokenAuthenticator;
//! # use gatekeeper_storage::{MemoryIdentityStore, MemoryRoleStore, RoleStore};
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let roles = Arc::new(MemoryRoleStore::with_default_roles());
//! let users = Arc::new(MemoryIdentityStore::new());
//! let ana = users
//!     .create_identity("ana", "ana@example.com", roles.get_by_name("user").await.unwrap())
//!     .await
//!     .unwrap();
//!
//! let authenticator = TokenAuthenticator::builder().secret(b"secret".to_vec()).build().unwrap();
//! let token = authenticator.issue_for(ana.id).unwrap();
//!
//! let pipeline = AdmissionPipeline::builder()
//!     .limiter(Arc::new(FixedWindowLimiter::new(RateLimitConfig::new(20, Duration::from_secs(5)))))
//!     .authenticator(Arc::new(authenticator))
//!     .resolver(IdentityResolver::builder().store(users).build())
//!     .authorizer(Authorizer::builder().roles(roles).build())
//!     .build();
//!
//! let request = AdmissionRequest::new("10.0.0.1", Some(format!("Bearer {token}")));
//! match pipeline.admit(&request).await {
//!     Decision::Admitted(identity) => assert_eq!(identity.username, "ana"),
//!     Decision::Rejected(rejection) => panic!("rejected: {}", rejection.reason),
//! }
//!
//! let anonymous = AdmissionRequest::new("10.0.0.1", None);
//! let Decision::Rejected(rejection) = pipeline.admit(&anonymous).await else { unreachable!() };
//! assert_eq!(rejection.status, RejectionStatus::Unauthorized);
//! # });
//! ```

use std::{sync::Arc, time::Duration};

use gatekeeper_authn::{TokenAuthenticator, extract_bearer};
use gatekeeper_storage::{Identity, UserId};
use tracing::{debug, warn};

use crate::{
    authorization::Authorizer,
    error::{AdmissionError, AdmissionResult},
    rate_limiter::FixedWindowLimiter,
    resolver::IdentityResolver,
};

/// Caller-facing rejection class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionStatus {
    /// The client is over its rate limit.
    TooManyRequests,
    /// The caller could not be authenticated.
    Unauthorized,
    /// The caller is authenticated but may not act on the resource.
    Forbidden,
}

impl RejectionStatus {
    /// The HTTP status code for this rejection.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::TooManyRequests => 429,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
        }
    }
}

impl std::fmt::Display for RejectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TooManyRequests => "too many requests",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
        };
        write!(f, "{} {name}", self.http_status())
    }
}

/// A denied request, as shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Status class.
    pub status: RejectionStatus,
    /// Caller-safe reason. Never carries internal detail.
    pub reason: String,
    /// Set only for rate-limit rejections.
    pub retry_after: Option<Duration>,
}

impl Rejection {
    /// A forbidden rejection for a check that completed and said no.
    #[must_use]
    pub fn forbidden() -> Self {
        Self { status: RejectionStatus::Forbidden, reason: "forbidden".to_owned(), retry_after: None }
    }
}

impl From<&AdmissionError> for Rejection {
    fn from(err: &AdmissionError) -> Self {
        let retry_after = match err {
            AdmissionError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        Self { status: err.status(), reason: err.caller_message(), retry_after }
    }
}

/// Outcome of [`AdmissionPipeline::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Every stage passed.
    Admitted(Identity),
    /// A stage failed.
    Rejected(Rejection),
}

impl Decision {
    /// Returns `true` for [`Decision::Admitted`].
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }

    /// Returns the rejection, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Admitted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Resource a request wants to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceScope {
    /// Account that owns the resource.
    pub owner_id: UserId,
    /// Minimum role a non-owner needs.
    pub required_role: String,
}

/// Everything the pipeline needs from an inbound request.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct AdmissionRequest {
    /// Rate limit key, typically the client address.
    #[builder(into)]
    pub client_key: String,
    /// Raw `Authorization` header.
    #[builder(into)]
    pub authorization: Option<String>,
    /// Resource scope; `None` admits any authenticated caller.
    pub resource: Option<ResourceScope>,
}

impl AdmissionRequest {
    /// A request without a resource scope.
    pub fn new(client_key: impl Into<String>, authorization: Option<String>) -> Self {
        Self { client_key: client_key.into(), authorization, resource: None }
    }

    /// Scopes the request to a resource.
    #[must_use]
    pub fn for_resource(mut self, owner_id: UserId, required_role: impl Into<String>) -> Self {
        self.resource = Some(ResourceScope { owner_id, required_role: required_role.into() });
        self
    }
}

/// Runs inbound requests through rate limiting, authentication, identity
/// resolution and authorization.
///
/// Components are injected; the pipeline holds no state of its own beyond
/// what they share.
#[derive(Debug, Clone, bon::Builder)]
pub struct AdmissionPipeline {
    /// Skip the rate limit stage when `None`.
    limiter: Option<Arc<FixedWindowLimiter>>,
    authenticator: Arc<TokenAuthenticator>,
    resolver: IdentityResolver,
    authorizer: Authorizer,
}

impl AdmissionPipeline {
    /// Charges one request to `client_key`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::RateLimited`] when the key is over its limit.
    pub fn check_rate_limit(&self, client_key: &str) -> AdmissionResult<()> {
        match &self.limiter {
            Some(limiter) => limiter.check(client_key),
            None => Ok(()),
        }
    }

    /// Validates a bearer header and resolves the identity it names.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidCredential`] for a missing, malformed or invalid token
    /// - [`AdmissionError::IdentityNotFound`] if the account is unknown, inactive or the
    ///   placeholder id
    /// - [`AdmissionError::BackendUnavailable`] if resolution failed
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, authorization: Option<&str>) -> AdmissionResult<Identity> {
        let token = extract_bearer(authorization)?;
        let claims = self.authenticator.validate(token)?;
        let user_id = claims.user_id()?;

        let identity = self.resolver.resolve(user_id).await?;
        if !identity.is_authenticatable() {
            return Err(AdmissionError::IdentityNotFound { user_id });
        }
        Ok(identity)
    }

    /// Checks whether `identity` may act on `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::RoleLookupFailed`] if the required role
    /// could not be resolved.
    pub async fn authorize(&self, identity: &Identity, resource: &ResourceScope) -> AdmissionResult<bool> {
        self.authorizer.authorize(identity, resource.owner_id, &resource.required_role).await
    }

    /// Runs every stage for `request`.
    #[tracing::instrument(skip_all, fields(client_key = %request.client_key))]
    pub async fn admit(&self, request: &AdmissionRequest) -> Decision {
        match self.run(request).await {
            Ok(Some(identity)) => {
                debug!(user_id = %identity.id, "request admitted");
                Decision::Admitted(identity)
            },
            Ok(None) => Decision::Rejected(Rejection::forbidden()),
            Err(e) => {
                warn!(client_key = %request.client_key, status = e.status().http_status(), error = %e, "request denied");
                Decision::Rejected(Rejection::from(&e))
            },
        }
    }

    /// `Ok(None)` means authorization completed and denied.
    async fn run(&self, request: &AdmissionRequest) -> AdmissionResult<Option<Identity>> {
        self.check_rate_limit(&request.client_key)?;

        let identity = self.authenticate(request.authorization.as_deref()).await?;

        if let Some(resource) = &request.resource
            && !self.authorize(&identity, resource).await?
        {
            warn!(
                client_key = %request.client_key,
                user_id = %identity.id,
                owner_id = %resource.owner_id,
                required_role = %resource.required_role,
                "insufficient role"
            );
            return Ok(None);
        }

        Ok(Some(identity))
    }
}
