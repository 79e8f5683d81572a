//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role does not
//! match. Use these in route handlers to enforce the caller's role at the
//! type level.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tradeflow_core::error::CoreError;
use tradeflow_core::roles::{ROLE_ADMIN, ROLE_CUSTOMER, ROLE_PROVIDER};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    role: &str,
    message: &str,
) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    if user.role != role {
        return Err(AppError::Core(CoreError::Forbidden(message.into())));
    }
    Ok(user)
}

/// Requires the `admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, ROLE_ADMIN, "Admin role required")
            .await
            .map(RequireAdmin)
    }
}

/// Requires the `customer` role.
pub struct RequireCustomer(pub AuthUser);

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, ROLE_CUSTOMER, "Customer role required")
            .await
            .map(RequireCustomer)
    }
}

/// Requires the `provider` role. `user_id` is then the provider id.
pub struct RequireProvider(pub AuthUser);

impl FromRequestParts<AppState> for RequireProvider {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, ROLE_PROVIDER, "Provider role required")
            .await
            .map(RequireProvider)
    }
}
