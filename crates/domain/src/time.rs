//! Time and timestamp helpers.
//!
//! Two clocks are in play: wall-clock [`Timestamp`]s label events and status
//! snapshots, while every hysteresis decision (debounce, minimum run,
//! cool-down, spin-up) uses a monotonic [`Instant`] supplied by the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};

pub use std::time::Instant;

/// UTC timestamp used for event and snapshot times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Elapsed time between `since` and `now`, zero when `now` is earlier.
#[must_use]
pub fn elapsed_between(since: Instant, now: Instant) -> Duration {
    now.saturating_duration_since(since)
}
