//! Shared application state for axum handlers.

use std::sync::Arc;

use dusthub_app::control::ControlHandle;
use dusthub_app::event_bus::InProcessEventBus;
use dusthub_app::status::StatusBoard;

/// Application state shared across all axum handlers.
///
/// Every field is a cheap handle onto something owned by the control loop,
/// so cloning the state per request is free.
#[derive(Clone)]
pub struct AppState {
    /// Read side of the status port.
    pub status: StatusBoard,
    /// Sends manual commands to the control loop.
    pub control: ControlHandle,
    /// Source of the live event stream.
    pub event_bus: Arc<InProcessEventBus>,
}

impl AppState {
    #[must_use]
    pub fn new(
        status: StatusBoard,
        control: ControlHandle,
        event_bus: Arc<InProcessEventBus>,
    ) -> Self {
        Self {
            status,
            control,
            event_bus,
        }
    }
}
