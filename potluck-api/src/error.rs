use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use potluck_order::ResolutionError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    /// Request was valid but cannot be acted on right now
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn from_resolution(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Invalid(_) | ResolutionError::NoBillableItems { .. } => {
                AppError::ValidationError(err.to_string())
            }
            ResolutionError::RestaurantNotFound(_) | ResolutionError::NoPendingOrder(_) => {
                AppError::NotFoundError(err.to_string())
            }
            ResolutionError::OrderingClosed(_) => AppError::ConflictError(err.to_string()),
            ResolutionError::Store(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
