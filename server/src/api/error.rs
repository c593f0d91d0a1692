use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Helper to log error and return generic internal server error
pub fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    error!("Internal error: {}", err);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

pub fn route_not_found() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "Route not found")
}
