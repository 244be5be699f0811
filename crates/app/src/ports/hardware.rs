//! Hardware abstraction port — boards exposing analog, digital and PWM pins.
//!
//! Calls are synchronous and must return promptly: analog boards sample in
//! their own background loop and hand out a copy of their ring buffer, so no
//! read ever waits on a bus transaction started by the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dusthub_domain::error::{ConfigurationMismatch, HardwareError};
use dusthub_domain::id::BoardId;
use dusthub_domain::topology::Capability;

/// Copy of a board's sample ring for one analog pin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalogWindow {
    /// Samples oldest first, at most the ring capacity.
    pub samples: Vec<f64>,
    /// Total number of samples ever recorded on this pin.
    pub sequence: u64,
}

impl AnalogWindow {
    /// Samples recorded after `cursor` (a previous [`sequence`](Self::sequence)).
    #[must_use]
    pub fn fresh(&self, cursor: u64) -> &[f64] {
        let new = usize::try_from(self.sequence.saturating_sub(cursor)).unwrap_or(usize::MAX);
        let skip = self.samples.len().saturating_sub(new);
        &self.samples[skip..]
    }
}

/// A physical (or simulated) board.
///
/// Boards implement only the capabilities they advertise; the default method
/// bodies report [`HardwareError::Unsupported`].
pub trait Board: Send + Sync {
    fn id(&self) -> &BoardId;

    fn capabilities(&self) -> &BTreeSet<Capability>;

    /// Number of addressable pins or channels.
    fn channels(&self) -> u8;

    /// Whether the board finished its own startup (e.g. filled its sample
    /// rings). Boards that are not ready are skipped, not failed.
    fn is_ready(&self) -> bool {
        true
    }

    fn read_analog_window(&self, pin: u8) -> Result<AnalogWindow, HardwareError> {
        let _ = pin;
        Err(unsupported(self.id(), Capability::AnalogIn))
    }

    fn read_digital(&self, pin: u8) -> Result<bool, HardwareError> {
        let _ = pin;
        Err(unsupported(self.id(), Capability::DigitalIo))
    }

    fn write_digital(&self, pin: u8, level: bool) -> Result<(), HardwareError> {
        let _ = (pin, level);
        Err(unsupported(self.id(), Capability::DigitalIo))
    }

    fn write_pwm_duty(&self, pin: u8, duty: u16) -> Result<(), HardwareError> {
        let _ = (pin, duty);
        Err(unsupported(self.id(), Capability::PwmOut))
    }

    fn set_pwm_frequency(&self, hz: f64) -> Result<(), HardwareError> {
        let _ = hz;
        Err(unsupported(self.id(), Capability::PwmOut))
    }

    /// Current PWM frequency, `None` for boards without PWM.
    fn pwm_frequency(&self) -> Option<f64> {
        None
    }
}

fn unsupported(board: &BoardId, capability: Capability) -> HardwareError {
    HardwareError::Unsupported {
        board: board.to_string(),
        capability: capability.as_str(),
    }
}

/// Shared, read-only handle to a board. The core never owns board lifecycle.
pub type BoardHandle = Arc<dyn Board>;

/// Boards available to the composition root, keyed by id.
#[derive(Default, Clone)]
pub struct BoardRegistry {
    boards: BTreeMap<BoardId, BoardHandle>,
}

impl BoardRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a board, replacing any previous board with the same id.
    pub fn register(&mut self, board: BoardHandle) {
        self.boards.insert(board.id().clone(), board);
    }

    #[must_use]
    pub fn get(&self, id: &BoardId) -> Option<&BoardHandle> {
        self.boards.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoardHandle> {
        self.boards.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Resolve the board an entity is wired to and check it can serve `pins`
    /// with `capability`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationMismatch`] when the board is unknown, lacks
    /// the capability, or has fewer channels than a requested pin.
    pub fn require(
        &self,
        entity: &str,
        board: &BoardId,
        capability: Capability,
        pins: &[u8],
    ) -> Result<BoardHandle, ConfigurationMismatch> {
        let handle = self
            .boards
            .get(board)
            .ok_or_else(|| ConfigurationMismatch::UnknownBoard {
                entity: entity.to_string(),
                board: board.to_string(),
            })?;
        if !handle.capabilities().contains(&capability) {
            return Err(ConfigurationMismatch::MissingCapability {
                entity: entity.to_string(),
                board: board.to_string(),
                capability: capability.as_str(),
            });
        }
        let channels = handle.channels();
        if let Some(&pin) = pins.iter().find(|&&pin| pin >= channels) {
            return Err(ConfigurationMismatch::PinOutOfRange {
                entity: entity.to_string(),
                board: board.to_string(),
                pin,
                channels,
            });
        }
        Ok(Arc::clone(handle))
    }
}

impl std::fmt::Debug for BoardRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.boards.keys()).finish()
    }
}
