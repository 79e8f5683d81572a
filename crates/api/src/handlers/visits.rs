//! Handlers for the `/visits` resource.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use tradeflow_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::rbac::RequireCustomer;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::workflows::booking::{self, LockScope};

/// POST /api/v1/visits/{id}/lock
///
/// Lock a DRAFT visit's scope. Returns 409 if it was already locked. When
/// this lock completes the job, the response carries the provider the
/// first dispatch step offered it to.
pub async fn lock_scope(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Path(visit_id): Path<DbId>,
    Json(input): Json<LockScope>,
) -> AppResult<impl IntoResponse> {
    let result = booking::lock_scope(
        &state.pool,
        &state.config.dispatch,
        &user.actor(),
        visit_id,
        &input,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse { data: result }))
}
