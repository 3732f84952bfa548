use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marquee_core::error::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Core(CoreError),
    Internal(anyhow::Error),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Core(CoreError::NotFound(what)) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{what} not found") })),
            )
                .into_response(),
            AppError::Core(CoreError::Conflict(seats)) => (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "requested seats are unavailable",
                    "conflicting_seats": seats,
                })),
            )
                .into_response(),
            AppError::Core(CoreError::Expired) => (
                StatusCode::GONE,
                Json(json!({ "error": "hold expired before payment completed" })),
            )
                .into_response(),
            AppError::Core(CoreError::Stale) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "reservation is already in a terminal state" })),
            )
                .into_response(),
            AppError::Core(CoreError::Store(msg)) => {
                tracing::error!("store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "store unavailable" })),
                )
                    .into_response()
            }
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}
