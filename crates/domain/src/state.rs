//! Discrete states shared by devices and the status port.

use serde::{Deserialize, Serialize};

/// Binary on/off state of a source, relay or indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    #[default]
    Off,
    On,
}

impl Power {
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    #[must_use]
    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Externally visible state of any entity, as reported by the status port.
///
/// Degraded states ([`Uninitialized`](Self::Uninitialized),
/// [`Calibrating`](Self::Calibrating), [`Faulted`](Self::Faulted),
/// [`Unavailable`](Self::Unavailable)) stand in for values that cannot be
/// trusted; queries never fail for a dead device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    On,
    Off,
    Open,
    Closed,
    SpinningUp,
    CoolingDown,
    Uninitialized,
    Calibrating,
    Faulted,
    Unavailable,
}

impl EntityState {
    /// Whether the value reflects live device data.
    #[must_use]
    pub fn is_available(self) -> bool {
        !matches!(
            self,
            Self::Uninitialized | Self::Calibrating | Self::Faulted | Self::Unavailable
        )
    }
}

impl From<Power> for EntityState {
    fn from(power: Power) -> Self {
        match power {
            Power::On => Self::On,
            Power::Off => Self::Off,
        }
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::SpinningUp => "spinning_up",
            Self::CoolingDown => "cooling_down",
            Self::Uninitialized => "uninitialized",
            Self::Calibrating => "calibrating",
            Self::Faulted => "faulted",
            Self::Unavailable => "unavailable",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_power_to_off() {
        assert_eq!(Power::default(), Power::Off);
    }

    #[test]
    fn should_build_power_from_bool() {
        assert_eq!(Power::from_bool(true), Power::On);
        assert!(!Power::from_bool(false).is_on());
    }

    #[test]
    fn should_report_degraded_states_as_unavailable() {
        assert!(!EntityState::Faulted.is_available());
        assert!(!EntityState::Calibrating.is_available());
        assert!(!EntityState::Uninitialized.is_available());
        assert!(EntityState::Open.is_available());
        assert!(EntityState::SpinningUp.is_available());
    }

    #[test]
    fn should_display_snake_case_variant_name() {
        assert_eq!(EntityState::CoolingDown.to_string(), "cooling_down");
        assert_eq!(EntityState::On.to_string(), "on");
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let json = serde_json::to_string(&EntityState::SpinningUp).unwrap();
        assert_eq!(json, "\"spinning_up\"");
        let parsed: EntityState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EntityState::SpinningUp);
    }
}
