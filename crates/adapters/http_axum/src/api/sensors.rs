//! Manual sensor commands.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use dusthub_domain::id::SourceId;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the reset endpoint.
pub enum ResetResponse {
    NoContent,
}

impl IntoResponse for ResetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `POST /api/sensors/{id}/reset`
///
/// Drops the sensor's calibration; it recalibrates from the next full window.
/// Answers once the control loop applied the reset.
pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResetResponse, ApiError> {
    let id = SourceId::from_str(&id)?;
    state.control.reset_sensor(id.clone()).await?;
    tracing::info!(sensor = %id, "sensor reset requested over http");
    Ok(ResetResponse::NoContent)
}
