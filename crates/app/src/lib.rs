//! # dusthub-app
//!
//! Application layer — device services, the control loop and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `Board` — analog windows, digital pins and PWM channels of one board
//!   - `EventPublisher` — fan-out of domain events
//! - Provide the **device services** that own entities and absorb device
//!   failures: `SourceMonitor`, `CollectorArbiter`, `GateCoordinator`,
//!   `IndicatorPanel`
//! - Run the periodic **`Orchestrator`** and assemble it from the static
//!   topology with `OrchestratorBuilder`
//! - Expose the **presentation port**: `StatusBoard` (read side) and
//!   `ControlHandle` (reset / identify)
//! - Provide **in-process infrastructure** (event bus, shutdown signal)
//!
//! ## Dependency rule
//! Depends on `dusthub-domain` only (plus `tokio` for channels, timers and
//! background tasks). Never imports adapter crates. Adapters depend on *this*
//! crate, not the reverse.

pub mod builder;
pub mod control;
pub mod error;
pub mod event_bus;
pub mod orchestrator;
pub mod ports;
pub mod services;
pub mod shutdown;
pub mod status;

#[cfg(test)]
mod testing;
