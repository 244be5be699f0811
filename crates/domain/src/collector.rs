//! Dust collector relay with hysteresis.
//!
//! The collector is shared by every source whose preference names it. It
//! decides its own relay transitions from the current user set and two
//! timestamps; the caller applies the decision to hardware and then confirms
//! it with [`Collector::mark_on`] / [`Collector::mark_off`]. A decision that
//! cannot be written is simply not confirmed and comes back on the next tick.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::{BoardId, CollectorId, SourceId};
use crate::state::{EntityState, Power};
use crate::time::{Instant, elapsed_between};

/// Timing guards of a collector motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorTiming {
    /// Time after switching on before the airflow is usable.
    pub spin_up: Duration,
    /// Minimum time the motor stays on once started.
    pub minimum_run: Duration,
    /// Minimum time the motor stays off once stopped.
    pub cool_down: Duration,
}

impl Default for CollectorTiming {
    fn default() -> Self {
        Self {
            spin_up: Duration::from_secs(5),
            minimum_run: Duration::from_secs(10),
            cool_down: Duration::from_secs(30),
        }
    }
}

/// Phase derived from relay state and timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorPhase {
    Off,
    SpinningUp,
    On,
    CoolingDown,
}

impl From<CollectorPhase> for EntityState {
    fn from(phase: CollectorPhase) -> Self {
        match phase {
            CollectorPhase::Off => Self::Off,
            CollectorPhase::SpinningUp => Self::SpinningUp,
            CollectorPhase::On => Self::On,
            CollectorPhase::CoolingDown => Self::CoolingDown,
        }
    }
}

/// Members that joined or left a collector's user set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub added: Vec<SourceId>,
    pub removed: Vec<SourceId>,
}

impl MembershipDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Collector {
    id: CollectorId,
    label: String,
    board: BoardId,
    pin: u8,
    active_low: bool,
    timing: CollectorTiming,
    relay: Power,
    users: BTreeSet<SourceId>,
    last_on: Option<Instant>,
    last_off: Instant,
}

impl Collector {
    /// Create a stopped collector. `started_at` counts as the last stop, so
    /// the cool-down also guards the first start.
    #[must_use]
    pub fn new(
        id: CollectorId,
        label: impl Into<String>,
        board: BoardId,
        pin: u8,
        timing: CollectorTiming,
        started_at: Instant,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            board,
            pin,
            active_low: false,
            timing,
            relay: Power::Off,
            users: BTreeSet::new(),
            last_on: None,
            last_off: started_at,
        }
    }

    #[must_use]
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    /// Replace the user set and return who joined and who left.
    pub fn set_users(&mut self, users: BTreeSet<SourceId>) -> MembershipDiff {
        let diff = MembershipDiff {
            added: users.difference(&self.users).cloned().collect(),
            removed: self.users.difference(&users).cloned().collect(),
        };
        self.users = users;
        diff
    }

    /// Relay transition due at `now`, if any.
    #[must_use]
    pub fn decide(&self, now: Instant) -> Option<Power> {
        match self.relay {
            Power::On => {
                let ran_long_enough = self
                    .last_on
                    .is_none_or(|on| elapsed_between(on, now) >= self.timing.minimum_run);
                (self.users.is_empty() && ran_long_enough).then_some(Power::Off)
            }
            Power::Off => {
                let rested_long_enough =
                    elapsed_between(self.last_off, now) >= self.timing.cool_down;
                (!self.users.is_empty() && rested_long_enough).then_some(Power::On)
            }
        }
    }

    /// Confirm that the relay was switched on at `now`.
    pub fn mark_on(&mut self, now: Instant) {
        self.relay = Power::On;
        self.last_on = Some(now);
    }

    /// Confirm that the relay was switched off at `now`.
    pub fn mark_off(&mut self, now: Instant) {
        self.relay = Power::Off;
        self.last_off = now;
    }

    #[must_use]
    pub fn phase(&self, now: Instant) -> CollectorPhase {
        match self.relay {
            Power::On => match self.last_on {
                Some(on) if elapsed_between(on, now) < self.timing.spin_up => {
                    CollectorPhase::SpinningUp
                }
                _ => CollectorPhase::On,
            },
            Power::Off => {
                if elapsed_between(self.last_off, now) < self.timing.cool_down {
                    CollectorPhase::CoolingDown
                } else {
                    CollectorPhase::Off
                }
            }
        }
    }

    /// Whether the motor is on and past its spin-up delay.
    #[must_use]
    pub fn is_ready(&self, now: Instant) -> bool {
        self.phase(now) == CollectorPhase::On
    }

    /// Pin level that drives the relay to `power`.
    #[must_use]
    pub fn relay_level(&self, power: Power) -> bool {
        power.is_on() != self.active_low
    }

    #[must_use]
    pub fn relay(&self) -> Power {
        self.relay
    }

    #[must_use]
    pub fn users(&self) -> &BTreeSet<SourceId> {
        &self.users
    }

    #[must_use]
    pub fn last_on(&self) -> Option<Instant> {
        self.last_on
    }

    #[must_use]
    pub fn last_off(&self) -> Instant {
        self.last_off
    }

    #[must_use]
    pub fn timing(&self) -> CollectorTiming {
        self.timing
    }

    #[must_use]
    pub fn id(&self) -> &CollectorId {
        &self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn board(&self) -> &BoardId {
        &self.board
    }

    #[must_use]
    pub fn pin(&self) -> u8 {
        self.pin
    }
}
