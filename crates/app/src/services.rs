//! Device services driven by the orchestrator.
//!
//! Each service owns one kind of device together with the board handle it
//! is wired to, and absorbs device-local hardware failures.

pub mod collector_arbiter;
pub mod gate_coordinator;
pub mod indicator_panel;
pub mod source_monitor;

pub use collector_arbiter::CollectorArbiter;
pub use gate_coordinator::{GateCoordinator, GateReport, IdentifySettings};
pub use indicator_panel::IndicatorPanel;
pub use source_monitor::{PollReport, SourceMonitor};
