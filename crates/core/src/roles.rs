//! Well-known role name constants.
//!
//! Roles are resolved outside this system and arrive in the `role` claim of
//! the caller's access token.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_PROVIDER: &str = "provider";

/// All recognised role names.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_CUSTOMER, ROLE_PROVIDER];

/// The caller of a workflow operation, as resolved by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// User id for customers and admins, provider id for providers.
    pub id: crate::types::DbId,
    pub role: String,
}

impl Actor {
    pub fn new(id: crate::types::DbId, role: impl Into<String>) -> Self {
        Self {
            id,
            role: role.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn is_customer(&self) -> bool {
        self.role == ROLE_CUSTOMER
    }

    pub fn is_provider(&self) -> bool {
        self.role == ROLE_PROVIDER
    }
}
