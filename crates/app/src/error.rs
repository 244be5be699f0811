//! Errors of the control loop's own bookkeeping.
//!
//! Device failures never show up here; they are absorbed by the service that
//! owns the device. An [`OrchestratorError`] means the loop can no longer
//! trust its own state and must shut down.

use dusthub_domain::id::CollectorId;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A per-device lock was poisoned by a panicking holder.
    #[error("lock poisoned: {what}")]
    LockPoisoned { what: String },

    /// A user set was routed to a collector the arbiter does not manage.
    #[error("routing references unknown collector {0}")]
    UnknownCollector(CollectorId),
}
