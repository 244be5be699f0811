//! Simulated analog waveforms and the bounded ring that stores them.

use std::collections::VecDeque;

use dusthub_app::ports::AnalogWindow;

/// Waveform produced by one simulated analog pin.
///
/// Waveforms are deterministic so a sensor calibrated on one signal always
/// lands on the same threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// The same value on every sample.
    Constant(f64),
    /// `center + amplitude` and `center - amplitude` in turn.
    Alternating { center: f64, amplitude: f64 },
}

impl Default for Signal {
    /// Idle current transformer: a small ripple around mid-scale.
    fn default() -> Self {
        Self::idle()
    }
}

impl Signal {
    #[must_use]
    pub const fn idle() -> Self {
        Self::Alternating {
            center: 1.65,
            amplitude: 0.005,
        }
    }

    /// A motor drawing current, well above any idle threshold.
    #[must_use]
    pub const fn running() -> Self {
        Self::Alternating {
            center: 1.65,
            amplitude: 0.25,
        }
    }

    /// Value of the `index`-th sample.
    #[must_use]
    pub fn sample(&self, index: u64) -> f64 {
        match *self {
            Self::Constant(value) => value,
            Self::Alternating { center, amplitude } if index % 2 == 0 => center + amplitude,
            Self::Alternating { center, amplitude } => center - amplitude,
        }
    }
}

/// Fixed-capacity sample buffer of one pin, oldest samples dropped first.
#[derive(Debug, Clone)]
pub(crate) struct SampleRing {
    samples: VecDeque<f64>,
    capacity: usize,
    sequence: u64,
}

impl SampleRing {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sequence: 0,
        }
    }

    pub(crate) fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.sequence += 1;
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub(crate) fn window(&self) -> AnalogWindow {
        AnalogWindow {
            samples: self.samples.iter().copied().collect(),
            sequence: self.sequence,
        }
    }
}
