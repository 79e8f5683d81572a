use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tradeflow_core::error::CoreError;
use tradeflow_db::repositories::CatalogueError;

/// Error returned by workflow operations and handlers.
///
/// Rendered as `{"error": <message>, "code": <CODE>}`. Guard failures keep
/// their own message; anything internal is logged and replaced with a
/// generic one.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<CatalogueError> for AppError {
    fn from(err: CatalogueError) -> Self {
        match err {
            CatalogueError::Database(e) => AppError::Database(e),
            CatalogueError::Core(e) => AppError::Core(e),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(err.to_string()))
    }
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Status, code and client-facing message for a domain error.
fn core_parts(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::InvalidTransition { from, to } => (
            StatusCode::CONFLICT,
            "INVALID_TRANSITION",
            format!("Cannot move job from {from} to {to}"),
        ),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

/// Status, code and client-facing message for a sqlx error.
///
/// Postgres codes that a concurrent request can legitimately trigger are
/// surfaced as 409: unique violations on `uq_*` constraints (a duplicate
/// scope summary, a second pending charge) and serialization failures.
fn sqlx_parts(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    if let sqlx::Error::RowNotFound = err {
        return (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        );
    }

    if let sqlx::Error::Database(db_err) = err {
        match db_err.code().as_deref() {
            Some("23505") => {
                if let Some(constraint) = db_err.constraint().filter(|c| c.starts_with("uq_")) {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            Some("40001") => {
                return (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    "The job changed concurrently; retry the request".to_string(),
                );
            }
            _ => {}
        }
    }

    tracing::error!(error = %err, "Database error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_MESSAGE.to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(err) => core_parts(err),
            AppError::Database(err) => sqlx_parts(err),
        };
        (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
    }
}
