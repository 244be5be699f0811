//! Source monitor — polls every activity sensor and debounced input.
//!
//! A failed read is local to its device: it is counted, logged and reflected
//! in the device's reported state, and polling carries on with the next one.

use std::collections::{BTreeMap, BTreeSet};

use dusthub_domain::error::NotFoundError;
use dusthub_domain::id::SourceId;
use dusthub_domain::input::DebouncedInput;
use dusthub_domain::sensor::{ActivitySensor, Calibration, ReadFailure};
use dusthub_domain::status::{EntityKind, EntityStatus};
use dusthub_domain::time::Instant;

use crate::ports::BoardHandle;

struct SensorSlot {
    sensor: ActivitySensor,
    board: BoardHandle,
    /// Sequence number of the newest sample already fed to the sensor.
    cursor: u64,
}

struct InputSlot {
    input: DebouncedInput,
    board: BoardHandle,
}

/// What happened during one poll.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PollReport {
    /// At least one source flipped between active and idle.
    pub changed: bool,
    pub calibrated: Vec<(SourceId, Calibration)>,
    /// Sensors that hit their error limit, with the limit.
    pub faulted: Vec<(SourceId, u32)>,
}

#[derive(Default)]
pub struct SourceMonitor {
    sensors: BTreeMap<SourceId, SensorSlot>,
    inputs: BTreeMap<SourceId, InputSlot>,
}

impl SourceMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sensor(&mut self, sensor: ActivitySensor, board: BoardHandle) {
        self.sensors.insert(
            sensor.id().clone(),
            SensorSlot {
                sensor,
                board,
                cursor: 0,
            },
        );
    }

    pub fn add_input(&mut self, input: DebouncedInput, board: BoardHandle) {
        self.inputs
            .insert(input.id().clone(), InputSlot { input, board });
    }

    /// Read every source once.
    pub fn poll(&mut self, now: Instant) -> PollReport {
        let mut report = PollReport::default();
        for (id, slot) in &mut self.sensors {
            poll_sensor(id, slot, &mut report);
        }
        for (id, slot) in &mut self.inputs {
            if poll_input(id, slot, now) {
                report.changed = true;
            }
        }
        report
    }

    /// Ids of every source currently reporting activity.
    #[must_use]
    pub fn active_sources(&self) -> BTreeSet<SourceId> {
        let sensors = self
            .sensors
            .iter()
            .filter(|(_, slot)| slot.sensor.is_active())
            .map(|(id, _)| id.clone());
        let inputs = self
            .inputs
            .iter()
            .filter(|(_, slot)| slot.input.is_active())
            .map(|(id, _)| id.clone());
        sensors.chain(inputs).collect()
    }

    /// Forget a sensor's calibration so it re-learns its baseline.
    ///
    /// Returns whether the sensor was active before the reset.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if no sensor has this id.
    pub fn reset_sensor(&mut self, id: &SourceId) -> Result<bool, NotFoundError> {
        let slot = self.sensors.get_mut(id).ok_or_else(|| NotFoundError {
            entity: "Sensor",
            id: id.to_string(),
        })?;
        let was_active = slot.sensor.is_active();
        slot.sensor.reset();
        tracing::info!(sensor = %id, "sensor reset, recalibrating");
        Ok(was_active)
    }

    #[must_use]
    pub fn sensor(&self, id: &SourceId) -> Option<&ActivitySensor> {
        self.sensors.get(id).map(|slot| &slot.sensor)
    }

    #[must_use]
    pub fn input(&self, id: &SourceId) -> Option<&DebouncedInput> {
        self.inputs.get(id).map(|slot| &slot.input)
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &SourceId> {
        self.sensors.keys().chain(self.inputs.keys())
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<EntityStatus> {
        let sensors = self.sensors.values().map(|slot| {
            EntityStatus::new(
                slot.sensor.id().as_str(),
                EntityKind::Sensor,
                slot.sensor.label(),
                slot.sensor.entity_state(),
            )
        });
        let inputs = self.inputs.values().map(|slot| {
            EntityStatus::new(
                slot.input.id().as_str(),
                EntityKind::Input,
                slot.input.label(),
                slot.input.entity_state(),
            )
        });
        sensors.chain(inputs).collect()
    }
}

fn poll_sensor(id: &SourceId, slot: &mut SensorSlot, report: &mut PollReport) {
    if !slot.board.is_ready() {
        return;
    }
    match slot.board.read_analog_window(slot.sensor.pin()) {
        Ok(window) => {
            let fresh = window.fresh(slot.cursor);
            slot.cursor = window.sequence;
            let was_calibrated = slot.sensor.is_calibrated();

            if slot.sensor.update(fresh) {
                report.changed = true;
                tracing::info!(
                    sensor = %id,
                    state = ?slot.sensor.state(),
                    std_dev = slot.sensor.last_std_dev(),
                    "sensor state changed"
                );
            }

            if let Some(calibration) = slot.sensor.calibration()
                && !was_calibrated
            {
                tracing::info!(
                    sensor = %id,
                    baseline = calibration.baseline,
                    threshold = calibration.threshold,
                    "sensor calibrated"
                );
                report.calibrated.push((id.clone(), calibration));
            }
        }
        Err(err) => match slot.sensor.record_read_failure() {
            ReadFailure::Counted { consecutive } => {
                tracing::warn!(sensor = %id, %err, consecutive, "sensor read failed");
            }
            ReadFailure::Faulted { state_changed } => {
                let limit = slot.sensor.settings().max_errors;
                tracing::error!(
                    sensor = %id,
                    %err,
                    limit,
                    "sensor faulted after consecutive read failures, resetting"
                );
                report.changed |= state_changed;
                report.faulted.push((id.clone(), limit));
            }
        },
    }
}

fn poll_input(id: &SourceId, slot: &mut InputSlot, now: Instant) -> bool {
    match slot.board.read_digital(slot.input.pin()) {
        Ok(level) => {
            let was_faulted = slot.input.is_faulted();
            let was_active = slot.input.is_active();
            if was_faulted {
                tracing::info!(input = %id, "input readable again");
            }
            if slot.input.poll(level, now) {
                tracing::debug!(
                    input = %id,
                    state = ?slot.input.stable_state(),
                    "input transition"
                );
            }
            let active = slot.input.is_active();
            if active != was_active {
                tracing::info!(input = %id, active, "input state changed");
            }
            active != was_active
        }
        Err(err) => {
            if slot.input.read_failed() {
                tracing::warn!(input = %id, %err, "input read failed");
            }
            false
        }
    }
}
