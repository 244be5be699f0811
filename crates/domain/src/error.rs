//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`DustHubError`] via `#[from]`. Device-local failures
//! ([`HardwareError`]) are normally recorded by the owning component and
//! never reach callers; they only appear in this enum when a manual command
//! (reset, identify) has to report why it could not be applied.

/// Umbrella error for the dusthub workspace.
#[derive(Debug, thiserror::Error)]
pub enum DustHubError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A hardware board call failed.
    #[error("hardware error")]
    Hardware(#[from] HardwareError),

    /// The topology references a board, pin or entity that does not exist.
    #[error("configuration mismatch")]
    ConfigurationMismatch(#[from] ConfigurationMismatch),

    /// The control loop has stopped, or the targeted device is busy.
    #[error("temporarily unavailable")]
    Unavailable,
}

/// Reasons a definition or value failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// An identifier was empty.
    #[error("identifier must not be empty")]
    EmptyId,

    /// Two entities share the same identifier.
    #[error("duplicate identifier {id}")]
    DuplicateId { id: String },

    /// The rolling window cannot produce a standard deviation.
    #[error("window size must be at least 2, got {0}")]
    WindowTooSmall(usize),

    /// The threshold multiplier must be strictly positive and finite.
    #[error("threshold multiplier must be positive, got {0}")]
    InvalidMultiplier(f64),

    /// `max_errors` must allow at least one failure.
    #[error("max_errors must be at least 1")]
    ZeroMaxErrors,

    /// Servo angles must be within 0..=180 and ordered.
    #[error("invalid servo angle range {min}..={max}")]
    InvalidAngleRange { min: f64, max: f64 },

    /// An indicator needs one PWM channel per colour component.
    #[error("indicator needs exactly 3 pins, got {0}")]
    IndicatorPins(usize),

    /// A PWM board needs a finite, strictly positive frequency.
    #[error("board {board} needs a positive pwm_frequency_hz, got {hz}")]
    InvalidPwmFrequency { board: String, hz: f64 },

    /// The widest servo pulse does not fit in one PWM period.
    #[error("gate {gate} needs {pulse_us} us pulses but the PWM period is {period_us} us")]
    ServoPulseTooLong {
        gate: String,
        pulse_us: f64,
        period_us: f64,
    },

    /// Timer values are seconds and must be finite and non-negative.
    #[error("{entity} {field} must be a non-negative number of seconds, got {value}")]
    InvalidDuration {
        entity: String,
        field: &'static str,
        value: f64,
    },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of entity looked up (e.g. `"Sensor"`).
    pub entity: &'static str,
    /// The identifier that was not found.
    pub id: String,
}

/// Failure of a single hardware port call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    /// Reading a pin failed.
    #[error("read failed on {board} pin {pin}: {reason}")]
    ReadFailed {
        board: String,
        pin: u8,
        reason: String,
    },

    /// Writing a pin failed; the command is considered not applied.
    #[error("write failed on {board} pin {pin}: {reason}")]
    WriteFailed {
        board: String,
        pin: u8,
        reason: String,
    },

    /// The board does not expose the requested capability.
    #[error("board {board} does not support {capability}")]
    Unsupported {
        board: String,
        capability: &'static str,
    },

    /// The pin index is outside the board's range.
    #[error("board {board} has no pin {pin}")]
    InvalidPin { board: String, pin: u8 },
}

/// A topology entry references something the running system cannot provide.
///
/// The offending entity is skipped with a warning; the rest of the system
/// keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationMismatch {
    /// The referenced board was not registered.
    #[error("{entity} references unknown board {board}")]
    UnknownBoard { entity: String, board: String },

    /// The board exists but lacks the capability the entity needs.
    #[error("{entity} needs {capability} but board {board} does not provide it")]
    MissingCapability {
        entity: String,
        board: String,
        capability: &'static str,
    },

    /// The pin index is beyond the board's channel count.
    #[error("{entity} uses pin {pin} but board {board} has {channels} channels")]
    PinOutOfRange {
        entity: String,
        board: String,
        pin: u8,
        channels: u8,
    },

    /// A preference list names an entity that does not exist.
    #[error("{entity} references unknown {kind} {target}")]
    UnknownReference {
        entity: String,
        kind: &'static str,
        target: String,
    },
}
