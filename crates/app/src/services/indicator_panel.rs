//! Indicator panel — RGB lamps following the sources they listen to.

use std::collections::{BTreeMap, BTreeSet};

use dusthub_domain::error::HardwareError;
use dusthub_domain::id::{IndicatorId, SourceId};
use dusthub_domain::indicator::Indicator;
use dusthub_domain::state::Power;
use dusthub_domain::status::{EntityKind, EntityStatus};

use crate::ports::BoardHandle;

struct IndicatorSlot {
    indicator: Indicator,
    board: BoardHandle,
}

impl IndicatorSlot {
    fn show(&self, power: Power) -> Result<(), HardwareError> {
        let color = self.indicator.color_for(power);
        for (pin, duty) in self.indicator.pins().into_iter().zip(color.channels()) {
            self.board.write_pwm_duty(pin, duty)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct IndicatorPanel {
    indicators: BTreeMap<IndicatorId, IndicatorSlot>,
}

impl IndicatorPanel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, indicator: Indicator, board: BoardHandle) {
        self.indicators
            .insert(indicator.id().clone(), IndicatorSlot { indicator, board });
    }

    /// Show the off colour on every lamp.
    pub fn initialize(&mut self) {
        self.force_all(Power::Off);
    }

    /// Re-derive every lamp from the active sources and push only the ones
    /// that changed. A failed write keeps the old state so the next refresh
    /// retries it.
    ///
    /// [`statuses`](Self::statuses) reports the last state that reached the
    /// lamp, so after a failed write it lags the sources until a refresh
    /// succeeds.
    pub fn refresh(&mut self, active: &BTreeSet<SourceId>) -> Vec<IndicatorId> {
        let mut changed = Vec::new();
        for (id, slot) in &mut self.indicators {
            let next = slot.indicator.evaluate(active);
            if next == slot.indicator.state() {
                continue;
            }
            match slot.show(next) {
                Ok(()) => {
                    slot.indicator.set_state(next);
                    tracing::debug!(indicator = %id, state = ?next, "indicator updated");
                    changed.push(id.clone());
                }
                Err(err) => tracing::warn!(indicator = %id, %err, "indicator write failed"),
            }
        }
        changed
    }

    /// Turn every lamp off. Shutdown only.
    pub fn all_off(&mut self) {
        self.force_all(Power::Off);
    }

    fn force_all(&mut self, power: Power) {
        for (id, slot) in &mut self.indicators {
            match slot.show(power) {
                Ok(()) => slot.indicator.set_state(power),
                Err(err) => tracing::warn!(indicator = %id, %err, "indicator write failed"),
            }
        }
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<EntityStatus> {
        self.indicators
            .iter()
            .map(|(id, slot)| {
                EntityStatus::new(
                    id.as_str(),
                    EntityKind::Indicator,
                    slot.indicator.label(),
                    slot.indicator.state().into(),
                )
            })
            .collect()
    }
}
