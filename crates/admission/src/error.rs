//! Admission error taxonomy.
//!
//! Every failure on the admission path is one of five kinds, each mapped to
//! a fixed caller-facing status. The error itself, with its source chain, is
//! for server-side logging only; callers see [`AdmissionError::caller_message`].

use std::time::Duration;

use gatekeeper_authn::AuthError;
use gatekeeper_storage::{StorageError, UserId};
use thiserror::Error;

use crate::pipeline::RejectionStatus;

/// Result type alias for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// Errors raised by the admission stages.
#[derive(Debug, Clone, Error)]
pub enum AdmissionError {
    /// The client exhausted its request budget for the current window.
    ///
    /// Retryable once `retry_after` has elapsed.
    #[error("rate limit exceeded, retry after: {retry_after:?}")]
    RateLimited {
        /// Time until the client's window resets.
        retry_after: Duration,
    },

    /// The presented credential was missing, malformed or failed verification.
    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] AuthError),

    /// The token named an account that does not exist or cannot authenticate.
    #[error("identity not found: {user_id}")]
    IdentityNotFound {
        /// The account id from the token subject.
        user_id: UserId,
    },

    /// The cache or durable store failed or timed out.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] StorageError),

    /// The required role could not be resolved. Authorization fails closed.
    #[error("role lookup failed for '{role}': {source}")]
    RoleLookupFailed {
        /// The role name that was looked up.
        role: String,
        /// Why the lookup failed.
        #[source]
        source: StorageError,
    },
}

impl AdmissionError {
    /// The caller-facing status class for this error.
    #[must_use]
    pub fn status(&self) -> RejectionStatus {
        match self {
            Self::RateLimited { .. } => RejectionStatus::TooManyRequests,
            Self::InvalidCredential(_)
            | Self::IdentityNotFound { .. }
            | Self::BackendUnavailable(_) => RejectionStatus::Unauthorized,
            Self::RoleLookupFailed { .. } => RejectionStatus::Forbidden,
        }
    }

    /// The message safe to show a caller.
    ///
    /// Never includes ids, store errors or token details.
    #[must_use]
    pub fn caller_message(&self) -> String {
        match self {
            Self::RateLimited { retry_after } => {
                format!("rate limit exceeded, retry after: {retry_after:?}")
            },
            Self::InvalidCredential(_)
            | Self::IdentityNotFound { .. }
            | Self::BackendUnavailable(_) => "unauthorized".to_owned(),
            Self::RoleLookupFailed { .. } => "forbidden".to_owned(),
        }
    }

    /// Returns `true` if the same request may succeed later without change.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
