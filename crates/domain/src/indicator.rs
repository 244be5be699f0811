//! RGB indicator lamp derived from the state of the sources it listens to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{BoardId, IndicatorId, SourceId};
use crate::state::Power;

/// 16-bit PWM duty per colour component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl Color {
    pub const WHITE: Self = Self::new(u16::MAX, u16::MAX, u16::MAX);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(red: u16, green: u16, blue: u16) -> Self {
        Self { red, green, blue }
    }

    /// Duties in pin order (red, green, blue).
    #[must_use]
    pub fn channels(self) -> [u16; 3] {
        [self.red, self.green, self.blue]
    }
}

#[derive(Debug, Clone)]
pub struct Indicator {
    id: IndicatorId,
    label: String,
    board: BoardId,
    pins: [u8; 3],
    listens_to: Vec<SourceId>,
    on_color: Color,
    off_color: Color,
    state: Power,
}

impl Indicator {
    #[must_use]
    pub fn new(
        id: IndicatorId,
        label: impl Into<String>,
        board: BoardId,
        pins: [u8; 3],
        listens_to: Vec<SourceId>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            board,
            pins,
            listens_to,
            on_color: Color::WHITE,
            off_color: Color::BLACK,
            state: Power::Off,
        }
    }

    #[must_use]
    pub fn with_colors(mut self, on_color: Color, off_color: Color) -> Self {
        self.on_color = on_color;
        self.off_color = off_color;
        self
    }

    /// On iff any listened source is active.
    #[must_use]
    pub fn evaluate(&self, active: &BTreeSet<SourceId>) -> Power {
        Power::from_bool(self.listens_to.iter().any(|id| active.contains(id)))
    }

    #[must_use]
    pub fn color_for(&self, power: Power) -> Color {
        match power {
            Power::On => self.on_color,
            Power::Off => self.off_color,
        }
    }

    pub fn set_state(&mut self, state: Power) {
        self.state = state;
    }

    #[must_use]
    pub fn state(&self) -> Power {
        self.state
    }

    #[must_use]
    pub fn id(&self) -> &IndicatorId {
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
    pub fn pins(&self) -> [u8; 3] {
        self.pins
    }

    #[must_use]
    pub fn listens_to(&self) -> &[SourceId] {
        &self.listens_to
    }
}
