//! In-memory board implementing the hardware port.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dusthub_app::ports::{AnalogWindow, Board};
use dusthub_domain::error::HardwareError;
use dusthub_domain::id::BoardId;
use dusthub_domain::topology::{BoardDefinition, Capability};

use crate::signal::{SampleRing, Signal};

const DEFAULT_SAMPLE_RATE_HZ: f64 = 100.0;
const DEFAULT_RING_CAPACITY: usize = 100;
const DEFAULT_PWM_FREQUENCY_HZ: f64 = 50.0;

/// A simulated board.
///
/// Analog pins are filled by [`sample_once`](Self::sample_once) (driven by
/// [`spawn_sampler`](crate::spawn_sampler)) or by
/// [`push_samples`](Self::push_samples). Digital levels default to high, as
/// with pull-up wiring. Every output write is recorded.
pub struct VirtualBoard {
    id: BoardId,
    capabilities: BTreeSet<Capability>,
    channels: u8,
    sample_rate_hz: f64,
    rings: Mutex<Vec<SampleRing>>,
    signals: Mutex<Vec<Signal>>,
    levels: Mutex<Vec<bool>>,
    digital_writes: Mutex<Vec<(u8, bool)>>,
    pwm_writes: Mutex<Vec<(u8, u16)>>,
    pwm_frequency: Mutex<f64>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    ready: AtomicBool,
}

impl std::fmt::Debug for VirtualBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualBoard")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("channels", &self.channels)
            .field("ready", &self.ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl VirtualBoard {
    #[must_use]
    pub fn new(
        id: BoardId,
        capabilities: impl IntoIterator<Item = Capability>,
        channels: u8,
    ) -> Self {
        let capabilities: BTreeSet<Capability> = capabilities.into_iter().collect();
        let slots = usize::from(channels);
        // boards without analog pins have nothing to wait for
        let ready = !capabilities.contains(&Capability::AnalogIn);
        Self {
            id,
            capabilities,
            channels,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            rings: Mutex::new(vec![SampleRing::new(DEFAULT_RING_CAPACITY); slots]),
            signals: Mutex::new(vec![Signal::default(); slots]),
            levels: Mutex::new(vec![true; slots]),
            digital_writes: Mutex::new(Vec::new()),
            pwm_writes: Mutex::new(Vec::new()),
            pwm_frequency: Mutex::new(DEFAULT_PWM_FREQUENCY_HZ),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            ready: AtomicBool::new(ready),
        }
    }

    /// Build the board described by a topology entry.
    #[must_use]
    pub fn from_definition(definition: &BoardDefinition) -> Self {
        Self::new(
            definition.id.clone(),
            definition.capabilities(),
            definition.channels(),
        )
        .with_ring_capacity(definition.max_samples)
        .with_sample_rate(definition.sample_rate_hz)
        .with_pwm_frequency(definition.pwm_frequency_hz)
    }

    #[must_use]
    pub fn with_ring_capacity(self, capacity: usize) -> Self {
        {
            let mut rings = lock(&self.rings);
            for ring in rings.iter_mut() {
                *ring = SampleRing::new(capacity);
            }
        }
        self
    }

    #[must_use]
    pub fn with_sample_rate(mut self, hz: f64) -> Self {
        if hz.is_finite() && hz > 0.0 {
            self.sample_rate_hz = hz;
        }
        self
    }

    #[must_use]
    pub fn with_pwm_frequency(self, hz: f64) -> Self {
        *lock(&self.pwm_frequency) = hz;
        self
    }

    /// Delay between two sampling sweeps.
    #[must_use]
    pub fn sample_period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.sample_rate_hz)
            .unwrap_or(Duration::from_millis(10))
    }

    /// Change the waveform of an analog pin. Out-of-range pins are ignored.
    pub fn set_signal(&self, pin: u8, signal: Signal) {
        if let Some(slot) = lock(&self.signals).get_mut(usize::from(pin)) {
            *slot = signal;
        }
    }

    /// Append one sample of its waveform to every analog pin.
    pub fn sample_once(&self) {
        if !self.capabilities.contains(&Capability::AnalogIn) {
            return;
        }
        let signals = lock(&self.signals).clone();
        let mut rings = lock(&self.rings);
        for (ring, signal) in rings.iter_mut().zip(signals.iter()) {
            ring.push(signal.sample(ring.sequence()));
        }
        self.refresh_ready(&rings);
    }

    /// Append explicit samples to one pin. Out-of-range pins are ignored.
    pub fn push_samples(&self, pin: u8, samples: &[f64]) {
        let mut rings = lock(&self.rings);
        if let Some(ring) = rings.get_mut(usize::from(pin)) {
            for value in samples {
                ring.push(*value);
            }
        }
        self.refresh_ready(&rings);
    }

    /// Drive a digital pin from the outside, as a button would.
    pub fn set_level(&self, pin: u8, level: bool) {
        if let Some(slot) = lock(&self.levels).get_mut(usize::from(pin)) {
            *slot = level;
        }
    }

    /// Make every subsequent read fail until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail until cleared.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Skip the ring fill and report ready right away.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn digital_writes(&self) -> Vec<(u8, bool)> {
        lock(&self.digital_writes).clone()
    }

    #[must_use]
    pub fn pwm_writes(&self) -> Vec<(u8, u16)> {
        lock(&self.pwm_writes).clone()
    }

    /// Last level written to a digital pin.
    #[must_use]
    pub fn last_digital_write(&self, pin: u8) -> Option<bool> {
        lock(&self.digital_writes)
            .iter()
            .rev()
            .find(|(written, _)| *written == pin)
            .map(|(_, level)| *level)
    }

    /// Last duty written to a PWM channel.
    #[must_use]
    pub fn last_pwm_write(&self, pin: u8) -> Option<u16> {
        lock(&self.pwm_writes)
            .iter()
            .rev()
            .find(|(written, _)| *written == pin)
            .map(|(_, duty)| *duty)
    }

    fn refresh_ready(&self, rings: &[SampleRing]) {
        if !self.ready.load(Ordering::SeqCst) && rings.iter().all(SampleRing::is_full) {
            tracing::debug!(board = %self.id, "sample rings filled");
            self.ready.store(true, Ordering::SeqCst);
        }
    }

    fn check_pin(&self, pin: u8) -> Result<usize, HardwareError> {
        if pin < self.channels {
            Ok(usize::from(pin))
        } else {
            Err(HardwareError::InvalidPin {
                board: self.id.to_string(),
                pin,
            })
        }
    }

    fn check_capability(&self, capability: Capability) -> Result<(), HardwareError> {
        if self.capabilities.contains(&capability) {
            Ok(())
        } else {
            Err(HardwareError::Unsupported {
                board: self.id.to_string(),
                capability: capability.as_str(),
            })
        }
    }

    fn check_read(&self, pin: u8) -> Result<(), HardwareError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(HardwareError::ReadFailed {
                board: self.id.to_string(),
                pin,
                reason: "simulated bus error".to_string(),
            });
        }
        Ok(())
    }

    fn check_write(&self, pin: u8) -> Result<(), HardwareError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HardwareError::WriteFailed {
                board: self.id.to_string(),
                pin,
                reason: "simulated bus error".to_string(),
            });
        }
        Ok(())
    }
}

impl Board for VirtualBoard {
    fn id(&self) -> &BoardId {
        &self.id
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn read_analog_window(&self, pin: u8) -> Result<AnalogWindow, HardwareError> {
        self.check_capability(Capability::AnalogIn)?;
        let slot = self.check_pin(pin)?;
        self.check_read(pin)?;
        Ok(lock(&self.rings)
            .get(slot)
            .map(SampleRing::window)
            .unwrap_or_default())
    }

    fn read_digital(&self, pin: u8) -> Result<bool, HardwareError> {
        self.check_capability(Capability::DigitalIo)?;
        let slot = self.check_pin(pin)?;
        self.check_read(pin)?;
        Ok(lock(&self.levels).get(slot).copied().unwrap_or(true))
    }

    fn write_digital(&self, pin: u8, level: bool) -> Result<(), HardwareError> {
        self.check_capability(Capability::DigitalIo)?;
        let slot = self.check_pin(pin)?;
        self.check_write(pin)?;
        if let Some(current) = lock(&self.levels).get_mut(slot) {
            *current = level;
        }
        lock(&self.digital_writes).push((pin, level));
        Ok(())
    }

    fn write_pwm_duty(&self, pin: u8, duty: u16) -> Result<(), HardwareError> {
        self.check_capability(Capability::PwmOut)?;
        self.check_pin(pin)?;
        self.check_write(pin)?;
        lock(&self.pwm_writes).push((pin, duty));
        Ok(())
    }

    fn set_pwm_frequency(&self, hz: f64) -> Result<(), HardwareError> {
        self.check_capability(Capability::PwmOut)?;
        *lock(&self.pwm_frequency) = hz;
        Ok(())
    }

    fn pwm_frequency(&self) -> Option<f64> {
        self.capabilities
            .contains(&Capability::PwmOut)
            .then(|| *lock(&self.pwm_frequency))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
