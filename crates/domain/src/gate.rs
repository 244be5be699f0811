//! Servo-actuated blast gate.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{BoardId, GateId};
use crate::state::EntityState;

/// Logical position of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Open,
    #[default]
    Closed,
}

impl From<GateStatus> for EntityState {
    fn from(status: GateStatus) -> Self {
        match status {
            GateStatus::Open => Self::Open,
            GateStatus::Closed => Self::Closed,
        }
    }
}

/// Pulse-width mapping of a hobby servo on a 16-bit PWM channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoProfile {
    pub min_pulse_us: f64,
    pub max_pulse_us: f64,
    pub frequency_hz: f64,
}

impl Default for ServoProfile {
    fn default() -> Self {
        Self {
            min_pulse_us: 1000.0,
            max_pulse_us: 2000.0,
            frequency_hz: 50.0,
        }
    }
}

impl ServoProfile {
    #[must_use]
    pub fn with_frequency(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    /// Length of one PWM period in microseconds.
    #[must_use]
    pub fn period_us(&self) -> f64 {
        1_000_000.0 / self.frequency_hz
    }

    /// Whether the frequency is usable and the widest pulse fits in one period.
    #[must_use]
    pub fn fits_period(&self) -> bool {
        self.frequency_hz.is_finite()
            && self.frequency_hz > 0.0
            && self.max_pulse_us <= self.period_us()
    }

    /// Pulse width in microseconds for an angle in `[0, 180]`.
    #[must_use]
    pub fn pulse_for_angle(&self, angle: f64) -> f64 {
        let angle = angle.clamp(0.0, 180.0);
        self.min_pulse_us + (self.max_pulse_us - self.min_pulse_us) * angle / 180.0
    }

    /// 16-bit duty value for an angle, truncated like the PWM driver expects.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn duty_for_angle(&self, angle: f64) -> u16 {
        let duty = self.pulse_for_angle(angle) * f64::from(u16::MAX) / self.period_us();
        duty.clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

#[derive(Debug, Clone)]
pub struct Gate {
    id: GateId,
    label: String,
    board: BoardId,
    pin: u8,
    min_angle: f64,
    max_angle: f64,
    status: GateStatus,
}

impl Gate {
    /// Create a gate whose last commanded status is `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAngleRange`] unless
    /// `0 <= min_angle <= max_angle <= 180`.
    pub fn new(
        id: GateId,
        label: impl Into<String>,
        board: BoardId,
        pin: u8,
        min_angle: f64,
        max_angle: f64,
        initial: GateStatus,
    ) -> Result<Self, ValidationError> {
        if !(0.0..=180.0).contains(&min_angle)
            || !(0.0..=180.0).contains(&max_angle)
            || min_angle > max_angle
        {
            return Err(ValidationError::InvalidAngleRange {
                min: min_angle,
                max: max_angle,
            });
        }
        Ok(Self {
            id,
            label: label.into(),
            board,
            pin,
            min_angle,
            max_angle,
            status: initial,
        })
    }

    #[must_use]
    pub fn angle_for(&self, status: GateStatus) -> f64 {
        match status {
            GateStatus::Open => self.max_angle,
            GateStatus::Closed => self.min_angle,
        }
    }

    /// Whether commanding `desired` would move the servo.
    #[must_use]
    pub fn needs_move(&self, desired: GateStatus) -> bool {
        self.status != desired
    }

    /// Record a successfully commanded status.
    pub fn set_status(&mut self, status: GateStatus) {
        self.status = status;
    }

    #[must_use]
    pub fn status(&self) -> GateStatus {
        self.status
    }

    #[must_use]
    pub fn id(&self) -> &GateId {
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
    pub fn min_angle(&self) -> f64 {
        self.min_angle
    }

    #[must_use]
    pub fn max_angle(&self) -> f64 {
        self.max_angle
    }
}
