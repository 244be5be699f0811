//! Typed identifier newtypes backed by configuration slugs.
//!
//! Every entity is named in the static topology by a short string
//! (`"tablesaw"`, `"gate_planer"`). The newtypes keep a sensor id from being
//! passed where a gate id is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a slug.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner slug.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyId);
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

define_id!(
    /// Identifier of a hardware board (ADC, GPIO expander, PWM driver, native GPIO).
    BoardId
);

define_id!(
    /// Identifier of an activity source: an [`ActivitySensor`](crate::sensor::ActivitySensor)
    /// or a [`DebouncedInput`](crate::input::DebouncedInput).
    SourceId
);

define_id!(
    /// Identifier of a [`Collector`](crate::collector::Collector).
    CollectorId
);

define_id!(
    /// Identifier of a [`Gate`](crate::gate::Gate).
    GateId
);

define_id!(
    /// Identifier of an [`Indicator`](crate::indicator::Indicator).
    IndicatorId
);
