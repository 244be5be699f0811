//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use dusthub_domain::error::{DustHubError, NotFoundError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`DustHubError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(DustHubError);

impl From<DustHubError> for ApiError {
    fn from(err: DustHubError) -> Self {
        Self(err)
    }
}

impl From<NotFoundError> for ApiError {
    fn from(err: NotFoundError) -> Self {
        Self(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            DustHubError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            DustHubError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            DustHubError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()),
            DustHubError::Hardware(err) => {
                tracing::error!(error = %err, "hardware error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            DustHubError::ConfigurationMismatch(err) => {
                tracing::error!(error = %err, "configuration mismatch");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
