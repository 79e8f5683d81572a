//! Bearer-token caller extraction.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tradeflow_core::error::CoreError;
use tradeflow_core::roles::Actor;
use tradeflow_core::types::DbId;

use crate::auth::jwt::verify_token;
use crate::error::AppError;
use crate::state::AppState;

/// The verified caller of a request.
///
/// Every rejection is a 401; role mismatches are handled by the
/// [`rbac`](super::rbac) wrappers as 403.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// User id, or the provider id for providers.
    pub user_id: DbId,
    pub role: String,
    /// `jti` of the presented token.
    pub token_id: String,
}

impl AuthUser {
    /// The caller as seen by workflow guards.
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role.clone())
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.into()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| unauthorized("Missing Authorization header"))?
            .to_str()
            .map_err(|_| unauthorized("Authorization header is not valid text"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization format. Expected: Bearer <token>"))?;

        let (actor, claims) =
            verify_token(token, &state.config.jwt).map_err(|e| unauthorized(e.to_string()))?;

        tracing::debug!(user_id = actor.id, role = %actor.role, jti = %claims.jti, "Caller verified");
        Ok(AuthUser {
            user_id: actor.id,
            role: actor.role,
            token_id: claims.jti,
        })
    }
}
