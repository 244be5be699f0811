//! In-memory board used by the service tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dusthub_domain::error::HardwareError;
use dusthub_domain::id::BoardId;
use dusthub_domain::topology::Capability;

use crate::ports::{AnalogWindow, Board};

pub struct FakeBoard {
    id: BoardId,
    capabilities: BTreeSet<Capability>,
    analog: Mutex<BTreeMap<u8, AnalogWindow>>,
    levels: Mutex<BTreeMap<u8, bool>>,
    digital_writes: Mutex<Vec<(u8, bool)>>,
    pwm_writes: Mutex<Vec<(u8, u16)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    ready: AtomicBool,
}

impl FakeBoard {
    pub fn new(id: &str, capabilities: &[Capability]) -> Self {
        Self {
            id: BoardId::new(id),
            capabilities: capabilities.iter().copied().collect(),
            analog: Mutex::new(BTreeMap::new()),
            levels: Mutex::new(BTreeMap::new()),
            digital_writes: Mutex::new(Vec::new()),
            pwm_writes: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            ready: AtomicBool::new(true),
        }
    }

    pub fn into_handle(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn push_samples(&self, pin: u8, samples: &[f64]) {
        let mut analog = self.analog.lock().unwrap();
        let window = analog.entry(pin).or_default();
        window.samples.extend_from_slice(samples);
        let excess = window.samples.len().saturating_sub(1000);
        window.samples.drain(..excess);
        window.sequence += samples.len() as u64;
    }

    pub fn set_level(&self, pin: u8, level: bool) {
        self.levels.lock().unwrap().insert(pin, level);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn digital_writes(&self) -> Vec<(u8, bool)> {
        self.digital_writes.lock().unwrap().clone()
    }

    pub fn pwm_writes(&self) -> Vec<(u8, u16)> {
        self.pwm_writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.digital_writes.lock().unwrap().clear();
        self.pwm_writes.lock().unwrap().clear();
    }

    fn read_error(&self, pin: u8) -> Option<HardwareError> {
        self.fail_reads
            .load(Ordering::SeqCst)
            .then(|| HardwareError::ReadFailed {
                board: self.id.to_string(),
                pin,
                reason: "injected".to_string(),
            })
    }

    fn write_error(&self, pin: u8) -> Option<HardwareError> {
        self.fail_writes
            .load(Ordering::SeqCst)
            .then(|| HardwareError::WriteFailed {
                board: self.id.to_string(),
                pin,
                reason: "injected".to_string(),
            })
    }
}

impl Board for FakeBoard {
    fn id(&self) -> &BoardId {
        &self.id
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn channels(&self) -> u8 {
        16
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn read_analog_window(&self, pin: u8) -> Result<AnalogWindow, HardwareError> {
        if let Some(err) = self.read_error(pin) {
            return Err(err);
        }
        Ok(self
            .analog
            .lock()
            .unwrap()
            .get(&pin)
            .cloned()
            .unwrap_or_default())
    }

    fn read_digital(&self, pin: u8) -> Result<bool, HardwareError> {
        if let Some(err) = self.read_error(pin) {
            return Err(err);
        }
        Ok(self.levels.lock().unwrap().get(&pin).copied().unwrap_or(true))
    }

    fn write_digital(&self, pin: u8, level: bool) -> Result<(), HardwareError> {
        if let Some(err) = self.write_error(pin) {
            return Err(err);
        }
        self.digital_writes.lock().unwrap().push((pin, level));
        Ok(())
    }

    fn write_pwm_duty(&self, pin: u8, duty: u16) -> Result<(), HardwareError> {
        if let Some(err) = self.write_error(pin) {
            return Err(err);
        }
        self.pwm_writes.lock().unwrap().push((pin, duty));
        Ok(())
    }

    fn set_pwm_frequency(&self, _hz: f64) -> Result<(), HardwareError> {
        Ok(())
    }

    fn pwm_frequency(&self) -> Option<f64> {
        self.capabilities
            .contains(&Capability::PwmOut)
            .then_some(50.0)
    }
}

/// `n` samples alternating `center ± amplitude`.
pub fn alternating(n: usize, center: f64, amplitude: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                center + amplitude
            } else {
                center - amplitude
            }
        })
        .collect()
}
