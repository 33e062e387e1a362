//! Bearer token issuance and validation.
//!
//! Tokens are compact JWTs signed with HS256 and a shared secret. A token
//! names its user in `sub` (decimal id) and must carry `exp`, `iss` and
//! `aud`; issuer and audience are compared against configured values.
//!
//! # Example
//!
//! ```
//! use gatekeeper_authn::TokenAuthenticator;
//! use gatekeeper_storage::UserId;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authenticator = TokenAuthenticator::builder()
//!     .secret(b"a-long-random-secret".to_vec())
//!     .build()?;
//!
//! let token = authenticator.issue_for(UserId::from(42))?;
//! let claims = authenticator.validate(&token)?;
//! assert_eq!(claims.user_id()?, UserId::from(42));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use gatekeeper_storage::{ConfigError, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    error::{AuthError, Result},
    validation::{header_algorithm, validate_algorithm},
};

/// Issuer and audience used when none is configured.
pub const DEFAULT_ISSUER: &str = "ConnectApp Social";

/// Lifetime of an issued token when none is configured (two days).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// The only signing algorithm tokens may use.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims that must be present in every token.
const REQUIRED_CLAIMS: &[&str] = &["exp", "iss", "aud", "sub"];

/// JWT claims structure.
///
/// ```json
/// {
///   "sub": "42",
///   "iss": "ConnectApp Social",
///   "aud": "ConnectApp Social",
///   "exp": 1234567890,
///   "iat": 1234394890,
///   "nbf": 1234394890
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id as a decimal string.
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Not before (seconds since epoch).
    pub nbf: i64,
}

impl Claims {
    /// Builds claims for `user_id` issued at `now` and expiring `ttl` later.
    #[must_use]
    pub fn for_user(
        user_id: UserId,
        issuer: &str,
        audience: &str,
        ttl: TimeDelta,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            iss: issuer.to_owned(),
            aud: audience.to_owned(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Parses the subject as a user id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSubject`] if `sub` is not a decimal
    /// integer or is the zero placeholder.
    pub fn user_id(&self) -> Result<UserId> {
        let id: i64 = self
            .sub
            .parse()
            .map_err(|_| AuthError::invalid_subject(format!("'{}' is not a user id", self.sub)))?;
        let id = UserId::from(id);
        if id.is_placeholder() {
            return Err(AuthError::invalid_subject("subject names no account"));
        }
        Ok(id)
    }
}

/// Issues and validates bearer tokens with a shared secret.
///
/// Construction validates the configuration; a built authenticator never
/// fails for configuration reasons afterwards. It is immutable and can be
/// shared across tasks behind an `Arc`.
pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: TimeDelta,
    validation: Validation,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[bon::bon]
impl TokenAuthenticator {
    /// Creates an authenticator.
    ///
    /// # Arguments
    ///
    /// * `secret` - Shared HS256 secret. Must be non-empty.
    /// * `issuer` - Expected and embedded `iss` (default: [`DEFAULT_ISSUER`]).
    /// * `audience` - Expected and embedded `aud` (default: same as `issuer`).
    /// * `ttl` - Lifetime of issued tokens (default: [`DEFAULT_TOKEN_TTL`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the secret is empty, the TTL is zero, or the
    /// TTL does not fit a timestamp.
    #[builder]
    pub fn new(
        #[builder(into)] secret: Zeroizing<Vec<u8>>,
        #[builder(into, default = DEFAULT_ISSUER.to_owned())] issuer: String,
        #[builder(into)] audience: Option<String>,
        #[builder(default = DEFAULT_TOKEN_TTL)] ttl: Duration,
    ) -> std::result::Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::Missing { field: "token.secret" });
        }
        if ttl.is_zero() {
            return Err(ConfigError::BelowMinimum {
                field: "token.ttl",
                min: "1s".into(),
                value: "0s".into(),
            });
        }
        let ttl = TimeDelta::from_std(ttl).map_err(|e| ConfigError::Invalid {
            field: "token.ttl",
            message: e.to_string(),
        })?;
        let audience = audience.unwrap_or_else(|| issuer.clone());

        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.set_issuer(&[&issuer]);
        validation.set_audience(&[&audience]);
        validation.set_required_spec_claims(REQUIRED_CLAIMS);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&secret),
            decoding_key: DecodingKey::from_secret(&secret),
            issuer,
            audience,
            ttl,
            validation,
        })
    }

    /// Returns the configured issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the configured audience.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Signs `claims` as given.
    ///
    /// No claim is checked or filled in; use [`issue_for`](Self::issue_for)
    /// for normal issuance.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if encoding fails.
    pub fn generate(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(TOKEN_ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Issues a token for `user_id` using the configured issuer, audience and TTL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSubject`] for the zero placeholder id, or
    /// [`AuthError::Signing`] if encoding fails.
    #[tracing::instrument(skip(self))]
    pub fn issue_for(&self, user_id: UserId) -> Result<String> {
        if user_id.is_placeholder() {
            return Err(AuthError::invalid_subject("cannot issue a token for the placeholder id"));
        }
        let claims = Claims::for_user(user_id, &self.issuer, &self.audience, self.ttl, Utc::now());
        self.generate(&claims)
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Checks, in order: header algorithm, signature, expiry, not-before,
    /// issuer, audience, and that the subject names an account.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] describing the first failed check. Every
    /// error is terminal; there is no fallback verification.
    #[tracing::instrument(skip_all)]
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let alg = header_algorithm(token)?;
        validate_algorithm(&alg, TOKEN_ALGORITHM)?;

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        data.claims.user_id()?;
        tracing::trace!(sub = %data.claims.sub, "token validated");
        Ok(data.claims)
    }
}
