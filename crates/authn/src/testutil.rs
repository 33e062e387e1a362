//! Shared test utilities for authentication testing.
//!
//! This module provides helpers for building authenticators with a fixed
//! secret, producing claims with arbitrary time offsets, and crafting raw JWT
//! strings (for attack testing). It is feature-gated behind `testutil` to
//! prevent leaking into production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! gatekeeper-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use gatekeeper_authn::testutil::{craft_raw_jwt, test_authenticator};
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{TimeDelta, Utc};
use gatekeeper_storage::UserId;

use crate::jwt::{Claims, DEFAULT_ISSUER, TokenAuthenticator};

/// Secret used by [`test_authenticator`].
pub const TEST_SECRET: &[u8] = b"gatekeeper-test-secret";

/// Builds an authenticator with [`TEST_SECRET`] and default issuer/TTL.
///
/// # Panics
///
/// Panics if construction fails (it cannot with these inputs).
#[allow(clippy::expect_used)]
pub fn test_authenticator() -> TokenAuthenticator {
    authenticator_with_secret(TEST_SECRET)
}

/// Builds an authenticator with the given secret and default issuer/TTL.
///
/// # Panics
///
/// Panics if `secret` is empty.
#[allow(clippy::expect_used)]
pub fn authenticator_with_secret(secret: &[u8]) -> TokenAuthenticator {
    TokenAuthenticator::builder()
        .secret(secret.to_vec())
        .build()
        .expect("test authenticator config is valid")
}

/// Builds claims for `user_id` with the default issuer and audience.
///
/// `iat`/`nbf` are `now + issued_offset` and `exp` is `now + expires_offset`,
/// so negative offsets produce tokens from the past.
#[must_use]
pub fn claims_with_offsets(
    user_id: i64,
    issued_offset: TimeDelta,
    expires_offset: TimeDelta,
) -> Claims {
    let now = Utc::now();
    Claims {
        sub: UserId::from(user_id).to_string(),
        iss: DEFAULT_ISSUER.to_owned(),
        aud: DEFAULT_ISSUER.to_owned(),
        exp: (now + expires_offset).timestamp(),
        iat: (now + issued_offset).timestamp(),
        nbf: (now + issued_offset).timestamp(),
    }
}

/// Creates a raw JWT string from header and payload JSON with a fake signature.
///
/// Useful for algorithm substitution and malformed-structure tests where a
/// real signature must not be produced.
#[must_use]
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(header_json.to_string());
    let payload = URL_SAFE_NO_PAD.encode(payload_json.to_string());
    let signature = URL_SAFE_NO_PAD.encode(b"not-a-real-signature");
    format!("{header}.{payload}.{signature}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn crafted_jwt_has_three_parts() {
        let token = craft_raw_jwt(&json!({"alg": "HS256"}), &json!({"sub": "1"}));
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn offsets_are_applied() {
        let claims = claims_with_offsets(3, TimeDelta::hours(-2), TimeDelta::hours(-1));
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.sub, "3");
    }
}
