//! Caller identity.
//!
//! Tokens are issued elsewhere; this service only validates them.
//!
//! - [`jwt`] -- HS256 access token claims, validation and a test/tooling issuer.

pub mod jwt;
