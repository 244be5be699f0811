//! Activity sensor — detects tool usage from the variability of a
//! current-proportional voltage.
//!
//! A running motor makes the clamp-meter voltage jitter; an idle one leaves
//! it flat. The sensor therefore ignores the absolute level and compares the
//! rolling standard deviation against a threshold learned once from the
//! first full window (the idle baseline):
//!
//! ```text
//!  Uninitialized ──samples──▶ Calibrating ──W samples──▶ Active
//!        ▲                         ▲                        │
//!        │ reset()                 │ samples                │ max_errors
//!        │                         │                        ▼ consecutive
//!        └─────────────────────────┴──────────────────── Faulted
//! ```
//!
//! The threshold is never re-learned automatically; only [`ActivitySensor::reset`]
//! (manual) or a fault clears it.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{BoardId, SourceId};
use crate::state::{EntityState, Power};
use crate::stats::RollingWindow;

/// Tuning parameters of an activity sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Number of samples in the rolling window (W).
    pub window_size: usize,
    /// Multiplier applied to the calibrated baseline (M).
    pub threshold_multiplier: f64,
    /// Consecutive read failures before the sensor is reset.
    pub max_errors: u32,
    /// Lower bound for the derived threshold, in volts.
    pub min_threshold: f64,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            window_size: 50,
            threshold_multiplier: 3.0,
            max_errors: 5,
            min_threshold: 0.0,
        }
    }
}

impl SensorSettings {
    /// Check that the settings can drive a sensor.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the window is shorter than two
    /// samples, the multiplier is not a positive finite number, or
    /// `max_errors` is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.window_size < 2 {
            return Err(ValidationError::WindowTooSmall(self.window_size));
        }
        if !self.threshold_multiplier.is_finite() || self.threshold_multiplier <= 0.0 {
            return Err(ValidationError::InvalidMultiplier(self.threshold_multiplier));
        }
        if self.max_errors == 0 {
            return Err(ValidationError::ZeroMaxErrors);
        }
        Ok(())
    }
}

/// Lifecycle of an activity sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorLifecycle {
    Uninitialized,
    Calibrating,
    Active,
    Faulted,
}

/// Result of a completed calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Standard deviation of the first full window (σ₀).
    pub baseline: f64,
    /// Activity threshold (τ).
    pub threshold: f64,
}

/// Outcome of recording a failed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailure {
    /// Failure counted; the sensor keeps its state.
    Counted { consecutive: u32 },
    /// `max_errors` reached: the sensor was reset and is now faulted.
    /// `state_changed` is true when it was reporting activity before.
    Faulted { state_changed: bool },
}

/// Variability-based activity detector bound to one analog pin.
#[derive(Debug, Clone)]
pub struct ActivitySensor {
    id: SourceId,
    label: String,
    board: BoardId,
    pin: u8,
    settings: SensorSettings,
    window: RollingWindow,
    calibration: Option<Calibration>,
    state: Power,
    error_count: u32,
    lifecycle: SensorLifecycle,
    last_std_dev: Option<f64>,
}

impl ActivitySensor {
    /// Create an uncalibrated sensor.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if `settings` are invalid.
    pub fn new(
        id: SourceId,
        label: impl Into<String>,
        board: BoardId,
        pin: u8,
        settings: SensorSettings,
    ) -> Result<Self, ValidationError> {
        settings.validate()?;
        Ok(Self {
            id,
            label: label.into(),
            board,
            pin,
            window: RollingWindow::new(settings.window_size),
            settings,
            calibration: None,
            state: Power::Off,
            error_count: 0,
            lifecycle: SensorLifecycle::Uninitialized,
            last_std_dev: None,
        })
    }

    /// Feed samples newer than the previous call, oldest first.
    ///
    /// A call means the board read succeeded, so the consecutive error
    /// counter is cleared even when no new samples arrived. Returns `true`
    /// when the on/off state flipped. Calibration itself never reports a
    /// change; watch [`lifecycle`](Self::lifecycle) for it.
    pub fn update(&mut self, samples: &[f64]) -> bool {
        self.error_count = 0;
        if samples.is_empty() {
            return false;
        }
        if matches!(
            self.lifecycle,
            SensorLifecycle::Uninitialized | SensorLifecycle::Faulted
        ) {
            self.lifecycle = SensorLifecycle::Calibrating;
        }
        self.window.extend(samples);

        let Some(calibration) = self.calibration else {
            self.try_calibrate();
            return false;
        };

        let Some(std_dev) = self.window.std_dev() else {
            return false;
        };
        self.last_std_dev = Some(std_dev);

        let next = Power::from_bool(std_dev > calibration.threshold);
        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }

    fn try_calibrate(&mut self) {
        if !self.window.is_full() {
            return;
        }
        let Some(baseline) = self.window.std_dev() else {
            return;
        };
        let threshold =
            (baseline * self.settings.threshold_multiplier).max(self.settings.min_threshold);
        self.calibration = Some(Calibration {
            baseline,
            threshold,
        });
        self.last_std_dev = Some(baseline);
        self.lifecycle = SensorLifecycle::Active;
    }

    /// Record a failed board read.
    pub fn record_read_failure(&mut self) -> ReadFailure {
        self.error_count = self.error_count.saturating_add(1);
        if self.error_count < self.settings.max_errors {
            return ReadFailure::Counted {
                consecutive: self.error_count,
            };
        }
        let was_on = self.state.is_on();
        self.reset();
        self.lifecycle = SensorLifecycle::Faulted;
        ReadFailure::Faulted {
            state_changed: was_on,
        }
    }

    /// Clear window, state and calibration.
    pub fn reset(&mut self) {
        self.window.clear();
        self.calibration = None;
        self.state = Power::Off;
        self.error_count = 0;
        self.last_std_dev = None;
        self.lifecycle = SensorLifecycle::Uninitialized;
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
    pub fn settings(&self) -> &SensorSettings {
        &self.settings
    }

    #[must_use]
    pub fn state(&self) -> Power {
        self.state
    }

    #[must_use]
    pub fn lifecycle(&self) -> SensorLifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn calibration(&self) -> Option<Calibration> {
        self.calibration
    }

    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    #[must_use]
    pub fn threshold(&self) -> Option<f64> {
        self.calibration.map(|c| c.threshold)
    }

    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Standard deviation computed by the last evaluation, if any.
    #[must_use]
    pub fn last_std_dev(&self) -> Option<f64> {
        self.last_std_dev
    }

    /// Whether the sensor currently reports activity.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_on()
    }

    /// State as exposed through the status port.
    #[must_use]
    pub fn entity_state(&self) -> EntityState {
        match self.lifecycle {
            SensorLifecycle::Uninitialized => EntityState::Uninitialized,
            SensorLifecycle::Calibrating => EntityState::Calibrating,
            SensorLifecycle::Faulted => EntityState::Faulted,
            SensorLifecycle::Active => self.state.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn settings(window_size: usize, threshold_multiplier: f64) -> SensorSettings {
        SensorSettings {
            window_size,
            threshold_multiplier,
            max_errors: 3,
            min_threshold: 0.0,
        }
    }

    fn sensor(window_size: usize, threshold_multiplier: f64) -> ActivitySensor {
        ActivitySensor::new(
            SourceId::new("tablesaw"),
            "Table Saw",
            BoardId::new("adc0"),
            0,
            settings(window_size, threshold_multiplier),
        )
        .unwrap()
    }

    /// `n` samples alternating `center ± amplitude`.
    fn alternating(n: usize, center: f64, amplitude: f64) -> Vec<f64> {
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

    #[test]
    fn should_reject_window_smaller_than_two() {
        let err = settings(1, 3.0).validate().unwrap_err();
        assert_eq!(err, ValidationError::WindowTooSmall(1));
    }

    #[test]
    fn should_reject_non_positive_multiplier() {
        assert!(settings(10, 0.0).validate().is_err());
        assert!(settings(10, f64::NAN).validate().is_err());
    }

    #[test]
    fn should_start_uninitialized_and_off() {
        let s = sensor(4, 3.0);
        assert_eq!(s.lifecycle(), SensorLifecycle::Uninitialized);
        assert_eq!(s.state(), Power::Off);
        assert!(!s.is_calibrated());
        assert_eq!(s.entity_state(), EntityState::Uninitialized);
    }

    #[test]
    fn should_stay_calibrating_until_window_is_full() {
        let mut s = sensor(10, 3.0);
        assert!(!s.update(&alternating(9, 1.0, 0.01)));
        assert_eq!(s.lifecycle(), SensorLifecycle::Calibrating);
        assert!(!s.is_calibrated());
    }

    #[test]
    fn should_derive_threshold_from_baseline_times_multiplier() {
        let samples = alternating(50, 1.0, 0.01);
        let expected = crate::stats::sample_std_dev(&samples).unwrap();

        let mut s = sensor(50, 3.0);
        assert!(!s.update(&samples));

        let calibration = s.calibration().unwrap();
        assert!((calibration.baseline - expected).abs() < EPS);
        assert!((calibration.threshold - expected * 3.0).abs() < EPS);
        assert_eq!(s.lifecycle(), SensorLifecycle::Active);
        assert_eq!(s.state(), Power::Off);
    }

    #[test]
    fn should_calibrate_exactly_once_regardless_of_later_updates() {
        let mut s = sensor(20, 3.0);
        s.update(&alternating(20, 1.0, 0.01));
        let first = s.calibration().unwrap();

        for amplitude in [0.0, 0.2, 0.001, 0.5] {
            s.update(&alternating(20, 1.0, amplitude));
            assert_eq!(s.calibration().unwrap(), first);
        }
    }

    #[test]
    fn should_turn_on_when_variability_exceeds_threshold() {
        let mut s = sensor(50, 3.0);
        s.update(&alternating(50, 1.0, 0.01));

        assert!(s.update(&alternating(50, 1.0, 0.05)));
        assert_eq!(s.state(), Power::On);
        assert_eq!(s.entity_state(), EntityState::On);
    }

    #[test]
    fn should_report_no_change_when_state_is_stable() {
        let mut s = sensor(50, 3.0);
        s.update(&alternating(50, 1.0, 0.01));
        s.update(&alternating(50, 1.0, 0.05));
        assert!(!s.update(&alternating(10, 1.0, 0.05)));
    }

    #[test]
    fn should_turn_off_when_variability_drops_below_threshold() {
        let mut s = sensor(50, 3.0);
        s.update(&alternating(50, 1.0, 0.01));
        s.update(&alternating(50, 1.0, 0.05));

        assert!(s.update(&alternating(50, 1.0, 0.01)));
        assert_eq!(s.state(), Power::Off);
    }

    #[test]
    fn should_apply_threshold_floor_when_baseline_is_flat() {
        let mut s = ActivitySensor::new(
            SourceId::new("router"),
            "Router",
            BoardId::new("adc0"),
            1,
            SensorSettings {
                window_size: 10,
                threshold_multiplier: 3.0,
                max_errors: 3,
                min_threshold: 0.02,
            },
        )
        .unwrap();
        s.update(&[1.0; 10]);
        assert!((s.threshold().unwrap() - 0.02).abs() < EPS);
        assert!(!s.update(&alternating(10, 1.0, 0.005)));
    }

    #[test]
    fn should_ignore_empty_updates() {
        let mut s = sensor(4, 3.0);
        assert!(!s.update(&[]));
        assert_eq!(s.lifecycle(), SensorLifecycle::Uninitialized);
    }

    #[test]
    fn should_count_consecutive_failures_before_faulting() {
        let mut s = sensor(4, 3.0);
        assert_eq!(
            s.record_read_failure(),
            ReadFailure::Counted { consecutive: 1 }
        );
        assert_eq!(
            s.record_read_failure(),
            ReadFailure::Counted { consecutive: 2 }
        );
        assert_eq!(
            s.record_read_failure(),
            ReadFailure::Faulted {
                state_changed: false
            }
        );
        assert_eq!(s.lifecycle(), SensorLifecycle::Faulted);
        assert_eq!(s.entity_state(), EntityState::Faulted);
    }

    #[test]
    fn should_clear_error_count_after_successful_read() {
        let mut s = sensor(4, 3.0);
        s.record_read_failure();
        s.record_read_failure();
        s.update(&[]);
        assert_eq!(s.error_count(), 0);
        assert!(matches!(
            s.record_read_failure(),
            ReadFailure::Counted { consecutive: 1 }
        ));
    }

    #[test]
    fn should_drop_calibration_and_report_change_when_faulting_while_on() {
        let mut s = sensor(10, 3.0);
        s.update(&alternating(10, 1.0, 0.01));
        s.update(&alternating(10, 1.0, 0.2));
        assert!(s.is_active());

        s.record_read_failure();
        s.record_read_failure();
        let outcome = s.record_read_failure();

        assert_eq!(
            outcome,
            ReadFailure::Faulted {
                state_changed: true
            }
        );
        assert!(!s.is_calibrated());
        assert_eq!(s.state(), Power::Off);
    }

    #[test]
    fn should_recalibrate_after_fault_when_samples_resume() {
        let mut s = sensor(4, 3.0);
        for _ in 0..3 {
            s.record_read_failure();
        }
        s.update(&alternating(2, 1.0, 0.01));
        assert_eq!(s.lifecycle(), SensorLifecycle::Calibrating);
        s.update(&alternating(2, 1.0, 0.01));
        assert_eq!(s.lifecycle(), SensorLifecycle::Active);
    }

    #[test]
    fn should_forget_calibration_on_manual_reset() {
        let mut s = sensor(4, 3.0);
        s.update(&alternating(4, 1.0, 0.01));
        assert!(s.is_calibrated());
        s.reset();
        assert!(!s.is_calibrated());
        assert_eq!(s.lifecycle(), SensorLifecycle::Uninitialized);
    }
}
