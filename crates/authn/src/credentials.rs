//! Authorization header parsing.
//!
//! Two schemes are understood: `Bearer <token>` for API requests and
//! `Basic base64(user:pass)` for operator endpoints such as health and
//! metrics. The header must be exactly `<scheme> <value>` separated by a
//! single space.

use base64::{Engine, engine::general_purpose::STANDARD};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// Splits an authorization header into scheme and value.
fn split_scheme<'a>(header: Option<&'a str>, scheme: &str) -> Result<&'a str> {
    let header = match header {
        Some(h) if !h.is_empty() => h,
        _ => return Err(AuthError::MissingCredentials),
    };

    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(found), Some(value), None) if found == scheme && !value.is_empty() => Ok(value),
        (Some(found), Some(_), None) if found != scheme => {
            Err(AuthError::malformed_credentials(format!("expected {scheme} scheme")))
        },
        _ => Err(AuthError::malformed_credentials(format!("expected '{scheme} <value>'"))),
    }
}

/// Extracts the token from a `Bearer <token>` authorization header.
///
/// # Errors
///
/// - [`AuthError::MissingCredentials`] if the header is absent or empty
/// - [`AuthError::MalformedCredentials`] for any other scheme or shape
///
/// # Examples
///
/// ```
/// use gatekeeper_authn::credentials::extract_bearer;
///
/// assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
/// assert!(extract_bearer(Some("Basic abc")).is_err());
/// assert!(extract_bearer(None).is_err());
/// ```
pub fn extract_bearer(header: Option<&str>) -> Result<&str> {
    split_scheme(header, "Bearer")
}

/// Expected username and password for `Basic` authentication.
///
/// Comparison runs in constant time over both fields, and the expected
/// password is zeroized on drop.
pub struct BasicCredentials {
    username: String,
    password: Zeroizing<String>,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials").field("username", &self.username).finish_non_exhaustive()
    }
}

impl BasicCredentials {
    /// Creates the expected credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: Zeroizing::new(password.into()) }
    }

    /// Verifies a `Basic base64(user:pass)` authorization header.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingCredentials`] if the header is absent or empty
    /// - [`AuthError::MalformedCredentials`] if the scheme, encoding or `user:pass` shape is wrong
    /// - [`AuthError::InvalidCredentials`] if the pair does not match
    pub fn verify(&self, header: Option<&str>) -> Result<()> {
        let encoded = split_scheme(header, "Basic")?;
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded)
                .map_err(|_| AuthError::malformed_credentials("invalid base64 payload"))?,
        );
        let decoded = std::str::from_utf8(&decoded)
            .map_err(|_| AuthError::malformed_credentials("payload is not UTF-8"))?;

        let (user, pass) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::malformed_credentials("expected user:pass"))?;

        let user_ok = user.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = pass.as_bytes().ct_eq(self.password.as_bytes());
        if bool::from(user_ok & pass_ok) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}
