//! JWT algorithm validation.
//!
//! The header is checked before any signature work so that a token cannot
//! choose how it is verified. Only the single configured algorithm is
//! accepted and `none` is always rejected.

use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Algorithm;

use crate::error::{AuthError, Result};

/// Algorithms that are never accepted regardless of configuration.
///
/// `none` carries no signature at all.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "None", "NONE"];

/// Validate a JWT header algorithm against the configured one.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if:
/// - Algorithm is a variant of "none"
/// - Algorithm is not a recognized JWS algorithm name
/// - Algorithm differs from `expected`
///
/// # Examples
///
/// ```
/// use gatekeeper_authn::validation::validate_algorithm;
/// use jsonwebtoken::Algorithm;
///
/// assert!(validate_algorithm("HS256", Algorithm::HS256).is_ok());
/// assert!(validate_algorithm("HS512", Algorithm::HS256).is_err());
/// assert!(validate_algorithm("none", Algorithm::HS256).is_err());
/// ```
pub fn validate_algorithm(alg: &str, expected: Algorithm) -> Result<()> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    let parsed = Algorithm::from_str(alg)
        .map_err(|_| AuthError::unsupported_algorithm(format!("Unknown algorithm '{alg}'")))?;

    if parsed != expected {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' does not match the configured {expected:?}"
        )));
    }

    Ok(())
}

/// Read the `alg` field of a compact JWT header without verifying anything.
///
/// This is deliberately lenient about the rest of the header so that an
/// unexpected algorithm is reported as such rather than as a parse failure.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] if the token does not have three
/// dot-separated parts, the header is not base64url JSON, or `alg` is absent.
pub fn header_algorithm(token: &str) -> Result<String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::malformed_token("JWT must have 3 parts separated by dots"));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|e| AuthError::malformed_token(format!("Failed to decode JWT header: {e}")))?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::malformed_token(format!("Failed to parse JWT header: {e}")))?;

    header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| AuthError::malformed_token("JWT header has no alg"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn encode_header(json: &str) -> String {
        format!("{}.e30.sig", URL_SAFE_NO_PAD.encode(json))
    }

    #[test]
    fn test_configured_algorithm_accepted() {
        assert!(validate_algorithm("HS256", Algorithm::HS256).is_ok());
    }

    #[test]
    fn test_none_always_rejected() {
        for alg in FORBIDDEN_ALGORITHMS {
            let result = validate_algorithm(alg, Algorithm::HS256);
            assert!(
                matches!(result, Err(AuthError::UnsupportedAlgorithm(ref msg)) if msg.contains("security")),
                "{alg} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_other_known_algorithms_rejected() {
        for alg in ["HS384", "HS512", "RS256", "EdDSA", "ES256"] {
            let result = validate_algorithm(alg, Algorithm::HS256);
            assert!(
                matches!(result, Err(AuthError::UnsupportedAlgorithm(ref msg)) if msg.contains("does not match")),
                "{alg} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let result = validate_algorithm("HS256 ", Algorithm::HS256);
        assert!(matches!(result, Err(AuthError::UnsupportedAlgorithm(_))));
        assert!(validate_algorithm("", Algorithm::HS256).is_err());
    }

    #[test]
    fn test_header_algorithm_reads_alg() {
        let token = encode_header(r#"{"alg":"none","typ":"JWT"}"#);
        assert_eq!(header_algorithm(&token).unwrap(), "none");
    }

    #[test]
    fn test_header_algorithm_rejects_malformed() {
        assert!(matches!(header_algorithm("only.two"), Err(AuthError::MalformedToken(_))));
        assert!(matches!(header_algorithm("!!!.e30.sig"), Err(AuthError::MalformedToken(_))));
        let no_alg = encode_header(r#"{"typ":"JWT"}"#);
        assert!(matches!(header_algorithm(&no_alg), Err(AuthError::MalformedToken(_))));
    }
}
