//! Bearer token verification.
//!
//! Customers, providers and admins sign in elsewhere and present an HS256
//! JWT whose `sub` is their id (the provider id for providers) and whose
//! `role` claim names one of [`VALID_ROLES`]. This module turns such a token
//! into an [`Actor`]. [`issue_token`] mints tokens for local tooling and
//! tests.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tradeflow_core::roles::{Actor, VALID_ROLES};
use tradeflow_core::types::DbId;
use uuid::Uuid;

/// Token payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: DbId,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    /// Token id, logged alongside audited actions.
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret.
    pub secret: String,
    /// Lifetime of tokens minted by [`issue_token`].
    pub access_token_expiry_mins: i64,
}

impl JwtConfig {
    /// Read `JWT_SECRET` (required) and `JWT_ACCESS_EXPIRY_MINS`
    /// (default 15).
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_mins = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .ok()
            .map(|v| v.parse().expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64"))
            .unwrap_or(15);

        Self {
            secret,
            access_token_expiry_mins,
        }
    }
}

/// Why a bearer token was refused.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid or expired token")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("Unknown role '{0}'")]
    UnknownRole(String),
}

/// Mint a token for `subject` acting as `role`.
pub fn issue_token(
    subject: DbId,
    role: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let iat = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: subject,
        role: role.to_string(),
        exp: iat + config.access_token_expiry_mins * 60,
        iat,
        jti: Uuid::new_v4().to_string(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Check signature and expiry, then resolve the caller.
///
/// A well-signed token naming a role this service does not know is
/// rejected rather than treated as a guest.
pub fn verify_token(token: &str, config: &JwtConfig) -> Result<(Actor, Claims), TokenError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?
    .claims;

    if !VALID_ROLES.contains(&claims.role.as_str()) {
        return Err(TokenError::UnknownRole(claims.role));
    }
    Ok((Actor::new(claims.sub, claims.role.clone()), claims))
}
