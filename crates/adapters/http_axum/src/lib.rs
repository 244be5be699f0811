//! # dusthub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **status port** as JSON (`/api/states`, `/api/states/{id}`)
//! - Forward the two manual commands (sensor reset, gate identify) to the
//!   control loop through its [`ControlHandle`](dusthub_app::control::ControlHandle)
//! - Stream domain events to browsers as server-sent events
//!
//! ## Dependency rule
//! Depends on `dusthub-app` (status board, control handle, event bus) and
//! `dusthub-domain` (types used in responses). Never leaks axum types into
//! the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
