//! Manual gate commands.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use dusthub_domain::id::GateId;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the identify endpoint.
pub enum IdentifyResponse {
    Accepted,
}

impl IntoResponse for IdentifyResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted => StatusCode::ACCEPTED.into_response(),
        }
    }
}

/// `POST /api/gates/{id}/identify`
///
/// Starts the identify sweep in the background and answers right away; the
/// gate returns to its position once the sweep ends. A gate still sweeping
/// answers 503.
pub async fn identify(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<IdentifyResponse, ApiError> {
    let id = GateId::from_str(&id)?;
    state.control.identify_gate(id.clone()).await?;
    tracing::info!(gate = %id, "gate identify requested over http");
    Ok(IdentifyResponse::Accepted)
}
