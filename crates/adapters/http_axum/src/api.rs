//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod gates;
#[allow(clippy::missing_errors_doc)]
pub mod sensors;
pub mod sse;
#[allow(clippy::missing_errors_doc)]
pub mod states;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/states", get(states::list))
        .route("/states/{id}", get(states::get))
        .route("/sensors/{id}/reset", post(sensors::reset))
        .route("/gates/{id}/identify", post(gates::identify))
        .route("/events/stream", get(sse::stream))
}
