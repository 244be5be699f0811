//! Debounced digital input (push button, foot switch, tool contact).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::{BoardId, SourceId};
use crate::state::{EntityState, Power};
use crate::time::{Instant, elapsed_between};

/// How a debounced input maps onto an activity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Active while pressed.
    Momentary,
    /// Every accepted press flips a latched flag.
    #[default]
    Toggle,
}

/// Stable (debounced) contact state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
}

impl ButtonState {
    fn from_level(pressed: bool) -> Self {
        if pressed { Self::Pressed } else { Self::Released }
    }
}

/// Digital input with time-based debounce.
#[derive(Debug, Clone)]
pub struct DebouncedInput {
    id: SourceId,
    label: String,
    board: BoardId,
    pin: u8,
    debounce: Duration,
    active_low: bool,
    mode: InputMode,
    stable: ButtonState,
    latched: Power,
    last_transition: Option<Instant>,
    faulted: bool,
}

impl DebouncedInput {
    #[must_use]
    pub fn new(
        id: SourceId,
        label: impl Into<String>,
        board: BoardId,
        pin: u8,
        debounce: Duration,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            board,
            pin,
            debounce,
            active_low: true,
            mode: InputMode::default(),
            stable: ButtonState::Released,
            latched: Power::Off,
            last_transition: None,
            faulted: false,
        }
    }

    #[must_use]
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: InputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Feed a raw pin level sampled at `now`.
    ///
    /// Returns `true` when the stable state changed. A transition closer
    /// than the debounce interval to the previous accepted one is bounce and
    /// is dropped; the first transition is always accepted.
    pub fn poll(&mut self, raw_level: bool, now: Instant) -> bool {
        self.faulted = false;
        let observed = ButtonState::from_level(raw_level != self.active_low);
        if observed == self.stable {
            return false;
        }
        if let Some(last) = self.last_transition
            && elapsed_between(last, now) < self.debounce
        {
            return false;
        }

        self.stable = observed;
        self.last_transition = Some(now);
        if self.mode == InputMode::Toggle && observed == ButtonState::Pressed {
            self.latched = Power::from_bool(!self.latched.is_on());
        }
        true
    }

    /// Record a failed pin read.
    ///
    /// Returns `true` only for the first failure of a fault condition so the
    /// caller logs it once; a later successful [`poll`](Self::poll) clears it.
    pub fn read_failed(&mut self) -> bool {
        !std::mem::replace(&mut self.faulted, true)
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Whether the input counts as an active source.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self.mode {
            InputMode::Momentary => self.stable == ButtonState::Pressed,
            InputMode::Toggle => self.latched.is_on(),
        }
    }

    #[must_use]
    pub fn stable_state(&self) -> ButtonState {
        self.stable
    }

    #[must_use]
    pub fn last_transition(&self) -> Option<Instant> {
        self.last_transition
    }

    #[must_use]
    pub fn id(&self) -> &SourceId {
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

    #[must_use]
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    #[must_use]
    pub fn entity_state(&self) -> EntityState {
        if self.faulted {
            EntityState::Faulted
        } else {
            Power::from_bool(self.is_active()).into()
        }
    }
}
