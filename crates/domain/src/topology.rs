//! Static topology: every board and device, loaded once at startup.
//!
//! The definitions deserialize straight from the `[[boards]]`, `[[sensors]]`,
//! `[[inputs]]`, `[[collectors]]`, `[[gates]]` and `[[indicators]]` arrays of
//! the configuration file. [`Topology::validate`] rejects values no device
//! could run with; [`Topology::unknown_references`] lists preference entries
//! pointing at nothing, which are dropped with a warning rather than
//! aborting startup.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::CollectorTiming;
use crate::error::{ConfigurationMismatch, ValidationError};
use crate::gate::{GateStatus, ServoProfile};
use crate::id::{BoardId, CollectorId, GateId, IndicatorId, SourceId};
use crate::indicator::Color;
use crate::input::InputMode;
use crate::sensor::SensorSettings;

/// Capability a board may expose through the hardware port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    AnalogIn,
    DigitalIo,
    PwmOut,
}

impl Capability {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnalogIn => "analog-in",
            Self::DigitalIo => "digital-io",
            Self::PwmOut => "pwm-out",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board families known to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    /// 16-bit analog-to-digital converter.
    Ads1115,
    /// 12-bit analog-to-digital converter.
    Ads1015,
    /// 16-pin GPIO expander.
    Mcp23017,
    /// 16-channel PWM driver.
    Pca9685,
    /// GPIO header of the host.
    NativeGpio,
}

impl BoardKind {
    #[must_use]
    pub fn default_capabilities(self) -> &'static [Capability] {
        match self {
            Self::Ads1115 | Self::Ads1015 => &[Capability::AnalogIn],
            Self::Mcp23017 | Self::NativeGpio => &[Capability::DigitalIo],
            Self::Pca9685 => &[Capability::PwmOut],
        }
    }

    #[must_use]
    pub fn default_channels(self) -> u8 {
        match self {
            Self::Ads1115 | Self::Ads1015 => 4,
            Self::Mcp23017 | Self::Pca9685 => 16,
            Self::NativeGpio => 28,
        }
    }
}

fn default_sample_rate_hz() -> f64 {
    100.0
}

fn default_max_samples() -> usize {
    100
}

fn default_pwm_frequency_hz() -> f64 {
    50.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDefinition {
    pub id: BoardId,
    #[serde(default)]
    pub label: String,
    pub kind: BoardKind,
    /// Bus address, informational for simulated boards.
    #[serde(default)]
    pub address: Option<u16>,
    /// Overrides the capabilities implied by `kind`.
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,
    /// Overrides the channel count implied by `kind`.
    #[serde(default)]
    pub channels: Option<u8>,
    /// Background sampling rate of analog boards.
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: f64,
    /// Capacity of each per-pin sample ring.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: f64,
}

impl BoardDefinition {
    #[must_use]
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        match &self.capabilities {
            Some(caps) => caps.iter().copied().collect(),
            None => self.kind.default_capabilities().iter().copied().collect(),
        }
    }

    #[must_use]
    pub fn channels(&self) -> u8 {
        self.channels.unwrap_or_else(|| self.kind.default_channels())
    }
}

/// Collector and gate preferences of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Collectors this source uses. `None` means every collector.
    #[serde(default)]
    pub collectors: Option<Vec<CollectorId>>,
    /// Gates that must be open while this source is active.
    #[serde(default)]
    pub gates: Vec<GateId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDefinition {
    pub id: SourceId,
    #[serde(default)]
    pub label: String,
    pub board: BoardId,
    pub pin: u8,
    #[serde(default)]
    pub window_size: Option<usize>,
    #[serde(default)]
    pub threshold_multiplier: Option<f64>,
    #[serde(default)]
    pub max_errors: Option<u32>,
    #[serde(default)]
    pub min_threshold: Option<f64>,
    #[serde(flatten)]
    pub preferences: Preferences,
}

impl SensorDefinition {
    /// Per-sensor overrides applied on top of `defaults`.
    #[must_use]
    pub fn settings(&self, defaults: &SensorSettings) -> SensorSettings {
        SensorSettings {
            window_size: self.window_size.unwrap_or(defaults.window_size),
            threshold_multiplier: self
                .threshold_multiplier
                .unwrap_or(defaults.threshold_multiplier),
            max_errors: self.max_errors.unwrap_or(defaults.max_errors),
            min_threshold: self.min_threshold.unwrap_or(defaults.min_threshold),
        }
    }
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDefinition {
    pub id: SourceId,
    #[serde(default)]
    pub label: String,
    pub board: BoardId,
    pub pin: u8,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub mode: InputMode,
    #[serde(default = "default_true")]
    pub active_low: bool,
    #[serde(flatten)]
    pub preferences: Preferences,
}

impl InputDefinition {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_spin_up_secs() -> f64 {
    5.0
}

fn default_minimum_run_secs() -> f64 {
    10.0
}

fn default_cool_down_secs() -> f64 {
    30.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorDefinition {
    pub id: CollectorId,
    #[serde(default)]
    pub label: String,
    pub board: BoardId,
    pub pin: u8,
    #[serde(default = "default_spin_up_secs")]
    pub spin_up_secs: f64,
    #[serde(default = "default_minimum_run_secs")]
    pub minimum_run_secs: f64,
    #[serde(default = "default_cool_down_secs")]
    pub cool_down_secs: f64,
    #[serde(default)]
    pub active_low: bool,
}

impl CollectorDefinition {
    /// Timer fields as durations. Values beyond `Duration`'s range saturate.
    #[must_use]
    pub fn timing(&self) -> CollectorTiming {
        let secs = |value: f64| {
            Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
                Duration::MAX
            } else {
                Duration::ZERO
            })
        };
        CollectorTiming {
            spin_up: secs(self.spin_up_secs),
            minimum_run: secs(self.minimum_run_secs),
            cool_down: secs(self.cool_down_secs),
        }
    }

    fn check_timers(&self) -> Result<(), ValidationError> {
        let timers = [
            ("spin_up_secs", self.spin_up_secs),
            ("minimum_run_secs", self.minimum_run_secs),
            ("cool_down_secs", self.cool_down_secs),
        ];
        for (field, value) in timers {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ValidationError::InvalidDuration {
                    entity: self.id.to_string(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

fn default_max_angle() -> f64 {
    90.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDefinition {
    pub id: GateId,
    #[serde(default)]
    pub label: String,
    pub board: BoardId,
    pub pin: u8,
    #[serde(default)]
    pub min_angle: f64,
    #[serde(default = "default_max_angle")]
    pub max_angle: f64,
    /// Status assumed at startup.
    #[serde(default)]
    pub initial: GateStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    pub id: IndicatorId,
    #[serde(default)]
    pub label: String,
    pub board: BoardId,
    /// Red, green and blue PWM channels.
    pub pins: Vec<u8>,
    #[serde(default)]
    pub listens_to: Vec<SourceId>,
    #[serde(default)]
    pub on_color: Option<Color>,
    #[serde(default)]
    pub off_color: Option<Color>,
}

impl IndicatorDefinition {
    /// Pins as a fixed red/green/blue triple.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::IndicatorPins`] unless exactly three pins
    /// are configured.
    pub fn rgb_pins(&self) -> Result<[u8; 3], ValidationError> {
        <[u8; 3]>::try_from(self.pins.as_slice())
            .map_err(|_| ValidationError::IndicatorPins(self.pins.len()))
    }
}

/// All boards and devices of one installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub boards: Vec<BoardDefinition>,
    pub sensors: Vec<SensorDefinition>,
    pub inputs: Vec<InputDefinition>,
    pub collectors: Vec<CollectorDefinition>,
    pub gates: Vec<GateDefinition>,
    pub indicators: Vec<IndicatorDefinition>,
}

impl Topology {
    /// Check identifiers and numeric parameters.
    ///
    /// Board ids must be unique among boards; device ids must be unique
    /// across all device kinds so a single status lookup is unambiguous.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self, sensor_defaults: &SensorSettings) -> Result<(), ValidationError> {
        let mut boards = BTreeSet::new();
        for board in &self.boards {
            check_id(&mut boards, board.id.as_str())?;
            let hz = board.pwm_frequency_hz;
            let drives_pwm = board.capabilities().contains(&Capability::PwmOut);
            if drives_pwm && !(hz.is_finite() && hz > 0.0) {
                return Err(ValidationError::InvalidPwmFrequency {
                    board: board.id.to_string(),
                    hz,
                });
            }
        }

        let mut devices = BTreeSet::new();
        for sensor in &self.sensors {
            check_id(&mut devices, sensor.id.as_str())?;
            sensor.settings(sensor_defaults).validate()?;
        }
        for input in &self.inputs {
            check_id(&mut devices, input.id.as_str())?;
        }
        for collector in &self.collectors {
            check_id(&mut devices, collector.id.as_str())?;
            collector.check_timers()?;
        }
        for gate in &self.gates {
            check_id(&mut devices, gate.id.as_str())?;
            if !(0.0..=180.0).contains(&gate.min_angle)
                || !(0.0..=180.0).contains(&gate.max_angle)
                || gate.min_angle > gate.max_angle
            {
                return Err(ValidationError::InvalidAngleRange {
                    min: gate.min_angle,
                    max: gate.max_angle,
                });
            }
            if let Some(board) = self.board(&gate.board) {
                let profile = ServoProfile::default().with_frequency(board.pwm_frequency_hz);
                if !profile.fits_period() {
                    return Err(ValidationError::ServoPulseTooLong {
                        gate: gate.id.to_string(),
                        pulse_us: profile.max_pulse_us,
                        period_us: profile.period_us(),
                    });
                }
            }
        }
        for indicator in &self.indicators {
            check_id(&mut devices, indicator.id.as_str())?;
            indicator.rgb_pins()?;
        }
        Ok(())
    }

    /// Preference entries naming a collector, gate or source that is not
    /// defined.
    #[must_use]
    pub fn unknown_references(&self) -> Vec<ConfigurationMismatch> {
        let collectors: BTreeSet<&CollectorId> = self.collectors.iter().map(|c| &c.id).collect();
        let gates: BTreeSet<&GateId> = self.gates.iter().map(|g| &g.id).collect();
        let sources: BTreeSet<&SourceId> = self.source_ids().collect();

        let mut mismatches = Vec::new();
        let preferences = self
            .sensors
            .iter()
            .map(|s| (&s.id, &s.preferences))
            .chain(self.inputs.iter().map(|i| (&i.id, &i.preferences)));
        for (source, prefs) in preferences {
            for collector in prefs.collectors.iter().flatten() {
                if !collectors.contains(collector) {
                    mismatches.push(ConfigurationMismatch::UnknownReference {
                        entity: source.to_string(),
                        kind: "collector",
                        target: collector.to_string(),
                    });
                }
            }
            for gate in &prefs.gates {
                if !gates.contains(gate) {
                    mismatches.push(ConfigurationMismatch::UnknownReference {
                        entity: source.to_string(),
                        kind: "gate",
                        target: gate.to_string(),
                    });
                }
            }
        }
        for indicator in &self.indicators {
            for source in &indicator.listens_to {
                if !sources.contains(source) {
                    mismatches.push(ConfigurationMismatch::UnknownReference {
                        entity: indicator.id.to_string(),
                        kind: "source",
                        target: source.to_string(),
                    });
                }
            }
        }
        mismatches
    }

    /// Ids of every sensor and input.
    pub fn source_ids(&self) -> impl Iterator<Item = &SourceId> {
        self.sensors
            .iter()
            .map(|s| &s.id)
            .chain(self.inputs.iter().map(|i| &i.id))
    }

    #[must_use]
    pub fn board(&self, id: &BoardId) -> Option<&BoardDefinition> {
        self.boards.iter().find(|b| &b.id == id)
    }
}

fn check_id<'a>(seen: &mut BTreeSet<&'a str>, id: &'a str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    if !seen.insert(id) {
        return Err(ValidationError::DuplicateId { id: id.to_string() });
    }
    Ok(())
}
