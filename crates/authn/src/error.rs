//! Authentication error types.
//!
//! Every variant is terminal for the request that produced it: a caller sees
//! a generic "unauthorized" while the variant itself is logged server-side.

use thiserror::Error;

/// Authentication errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No credential was presented.
    #[error("Authorization header is missing")]
    MissingCredentials,

    /// The authorization header does not have the expected `<scheme> <value>` shape.
    #[error("Authorization header is malformed: {0}")]
    MalformedCredentials(String),

    /// Malformed JWT: cannot be decoded.
    #[error("Invalid token format: {0}")]
    MalformedToken(String),

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Token not yet valid (nbf claim in future).
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Issuer does not match the configured value.
    #[error("Invalid issuer: {0}")]
    InvalidIssuer(String),

    /// Audience doesn't match the configured value.
    #[error("Invalid audience: {0}")]
    InvalidAudience(String),

    /// Required claim is missing.
    #[error("Missing claim: {0}")]
    MissingClaim(String),

    /// The subject claim does not name a user account.
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// Algorithm is not the configured one.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Basic credentials did not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token could not be produced.
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    /// Creates a [`AuthError::MalformedToken`].
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken(message.into())
    }

    /// Creates a [`AuthError::MalformedCredentials`].
    #[must_use]
    pub fn malformed_credentials(message: impl Into<String>) -> Self {
        Self::MalformedCredentials(message.into())
    }

    /// Creates a [`AuthError::MissingClaim`].
    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim(claim.into())
    }

    /// Creates a [`AuthError::InvalidSubject`].
    #[must_use]
    pub fn invalid_subject(message: impl Into<String>) -> Self {
        Self::InvalidSubject(message.into())
    }

    /// Creates a [`AuthError::UnsupportedAlgorithm`].
    #[must_use]
    pub fn unsupported_algorithm(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm(message.into())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken => AuthError::malformed_token("Invalid JWT structure"),
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            ErrorKind::InvalidAudience => {
                AuthError::InvalidAudience("Audience validation failed".into())
            },
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer("Issuer validation failed".into()),
            ErrorKind::InvalidSubject => AuthError::invalid_subject("Subject validation failed"),
            ErrorKind::MissingRequiredClaim(claim) => AuthError::missing_claim(claim.as_str()),
            ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                AuthError::unsupported_algorithm("Algorithm not accepted")
            },
            _ => AuthError::malformed_token(format!("JWT error: {err}")),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use jsonwebtoken::errors::{Error as JwtError, ErrorKind};

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::malformed_token("test").to_string(), "Invalid token format: test");
        assert_eq!(AuthError::TokenExpired.to_string(), "Token expired");
        assert_eq!(AuthError::missing_claim("sub").to_string(), "Missing claim: sub");
        assert_eq!(AuthError::MissingCredentials.to_string(), "Authorization header is missing");
    }

    #[test]
    fn test_error_from_jsonwebtoken() {
        let cases = [
            (ErrorKind::ExpiredSignature, AuthError::TokenExpired),
            (ErrorKind::InvalidSignature, AuthError::InvalidSignature),
            (ErrorKind::ImmatureSignature, AuthError::TokenNotYetValid),
        ];
        for (kind, expected) in cases {
            let auth_err: AuthError = JwtError::from(kind).into();
            assert_eq!(auth_err, expected);
        }
    }

    #[test]
    fn test_claim_mismatches_are_distinct() {
        let aud: AuthError = JwtError::from(ErrorKind::InvalidAudience).into();
        let iss: AuthError = JwtError::from(ErrorKind::InvalidIssuer).into();
        assert!(matches!(aud, AuthError::InvalidAudience(_)));
        assert!(matches!(iss, AuthError::InvalidIssuer(_)));
    }

    #[test]
    fn test_missing_required_claim_keeps_name() {
        let err: AuthError =
            JwtError::from(ErrorKind::MissingRequiredClaim("exp".to_owned())).into();
        assert_eq!(err, AuthError::MissingClaim("exp".to_owned()));
    }

    #[test]
    fn test_algorithm_errors_map_to_unsupported() {
        let err: AuthError = JwtError::from(ErrorKind::InvalidAlgorithm).into();
        assert!(matches!(err, AuthError::UnsupportedAlgorithm(_)));
    }
}
