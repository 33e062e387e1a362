//! # Gatekeeper Authentication
//!
//! Credential verification for the gatekeeper admission pipeline.
//!
//! This crate provides:
//! - **Bearer tokens**: HS256 JWT issuance and validation ([`TokenAuthenticator`])
//! - **Algorithm validation**: the header algorithm is checked before any signature work
//! - **Header parsing**: `Bearer <token>` extraction and constant-time `Basic` checks
//!
//! ## Example
//!
//! ```
//! use gatekeeper_authn::{TokenAuthenticator, credentials::extract_bearer};
//! use gatekeeper_storage::UserId;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authenticator = TokenAuthenticator::builder().secret(b"secret".to_vec()).build()?;
//! let header = format!("Bearer {}", authenticator.issue_for(UserId::from(5))?);
//!
//! let claims = authenticator.validate(extract_bearer(Some(&header))?)?;
//! assert_eq!(claims.user_id()?, UserId::from(5));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Authorization header parsing.
pub mod credentials;
/// Authentication error types.
pub mod error;
/// Token issuance and validation.
pub mod jwt;
/// Algorithm validation.
pub mod validation;

/// Shared test helpers.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

// Re-export key types for convenience
pub use credentials::{BasicCredentials, extract_bearer};
pub use error::{AuthError, Result};
pub use jwt::{Claims, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL, TOKEN_ALGORITHM, TokenAuthenticator};
pub use validation::{FORBIDDEN_ALGORITHMS, validate_algorithm};
