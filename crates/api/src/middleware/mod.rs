//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the caller from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`rbac::RequireCustomer`] -- Requires the `customer` role.
//! - [`rbac::RequireProvider`] -- Requires the `provider` role.
//!
//! Role extractors only check the role claim. Whether the caller is a
//! party to a particular job is decided by the workflow guards.

pub mod auth;
pub mod rbac;
