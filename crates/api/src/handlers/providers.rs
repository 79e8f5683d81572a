//! Handlers for provider self-service.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::middleware::rbac::RequireProvider;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::workflows::providers::{self, SetOnline};

/// POST /api/v1/providers/me/online
pub async fn set_online(
    RequireProvider(user): RequireProvider,
    State(state): State<AppState>,
    Json(input): Json<SetOnline>,
) -> AppResult<impl IntoResponse> {
    let provider = providers::set_online(&state.pool, &user.actor(), input.is_online).await?;
    Ok(Json(DataResponse { data: provider }))
}
