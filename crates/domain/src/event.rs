//! Event — an immutable record of something that happened during a tick.
//!
//! Events are published after the fact on the in-process bus; subscribers
//! (the HTTP event stream, logging) never influence control decisions.

use serde::{Deserialize, Serialize};

use crate::id::SourceId;
use crate::status::EntityStatus;
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One or more entities changed state during a tick. Published at most
    /// once per tick.
    StatusChanged {
        changed: Vec<EntityStatus>,
        at: Timestamp,
    },
    /// A sensor finished learning its idle baseline.
    SensorCalibrated {
        sensor: SourceId,
        baseline: f64,
        threshold: f64,
        at: Timestamp,
    },
    /// A sensor hit its consecutive read-failure limit and was reset.
    SensorFaulted {
        sensor: SourceId,
        errors: u32,
        at: Timestamp,
    },
    /// The control loop stopped and all outputs were driven to a safe state.
    Shutdown { at: Timestamp },
}

impl Event {
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::StatusChanged { at, .. }
            | Self::SensorCalibrated { at, .. }
            | Self::SensorFaulted { at, .. }
            | Self::Shutdown { at } => *at,
        }
    }

    /// Stable name used as the SSE event type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "status_changed",
            Self::SensorCalibrated { .. } => "sensor_calibrated",
            Self::SensorFaulted { .. } => "sensor_faulted",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}
