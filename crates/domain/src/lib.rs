//! # dusthub-domain
//!
//! Pure domain model for the dusthub workshop dust-collection controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Rolling-window statistics used for activity detection
//! - **Activity sensors** (self-calibrating, variability based)
//! - **Debounced inputs** (buttons and switches)
//! - **Collectors** (relay hysteresis: spin-up, minimum run, cool-down)
//! - **Gates** (servo blast gates and their pulse-width mapping)
//! - **Indicators** (RGB lamps derived from source states)
//! - **Topology** definitions loaded once at startup
//! - **Status snapshots** and **events**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Every state machine takes the current [`time::Instant`] as an argument;
//! hardware access lives behind ports in the `app` crate.

pub mod error;
pub mod id;
pub mod stats;
pub mod time;

pub mod collector;
pub mod event;
pub mod gate;
pub mod indicator;
pub mod input;
pub mod sensor;
pub mod state;
pub mod status;
pub mod topology;
