//! Collector arbiter — turns user sets into relay transitions.
//!
//! [`CollectorArbiter::update_users`] only records membership;
//! [`CollectorArbiter::tick`] is the single place relays are switched. Each
//! collector sits behind its own mutex so membership updates and ticks never
//! interleave on the same collector.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use dusthub_domain::collector::Collector;
use dusthub_domain::id::{CollectorId, SourceId};
use dusthub_domain::state::Power;
use dusthub_domain::status::{EntityKind, EntityStatus};
use dusthub_domain::time::Instant;

use crate::error::OrchestratorError;
use crate::ports::BoardHandle;

struct CollectorSlot {
    collector: Mutex<Collector>,
    board: BoardHandle,
}

impl CollectorSlot {
    fn lock(&self, id: &CollectorId) -> Result<MutexGuard<'_, Collector>, OrchestratorError> {
        self.collector
            .lock()
            .map_err(|_| OrchestratorError::LockPoisoned {
                what: format!("collector {id}"),
            })
    }

    /// Drive the relay to `target` and confirm it on success.
    fn switch(&self, collector: &mut Collector, target: Power, now: Instant) -> bool {
        let level = collector.relay_level(target);
        match self.board.write_digital(collector.pin(), level) {
            Ok(()) => {
                match target {
                    Power::On => collector.mark_on(now),
                    Power::Off => collector.mark_off(now),
                }
                true
            }
            Err(err) => {
                tracing::warn!(
                    collector = %collector.id(),
                    target = ?target,
                    %err,
                    "relay write failed, retrying next tick"
                );
                false
            }
        }
    }
}

#[derive(Default)]
pub struct CollectorArbiter {
    collectors: BTreeMap<CollectorId, CollectorSlot>,
}

impl CollectorArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, collector: Collector, board: BoardHandle) {
        self.collectors.insert(
            collector.id().clone(),
            CollectorSlot {
                collector: Mutex::new(collector),
                board,
            },
        );
    }

    pub fn ids(&self) -> impl Iterator<Item = &CollectorId> {
        self.collectors.keys()
    }

    #[must_use]
    pub fn contains(&self, id: &CollectorId) -> bool {
        self.collectors.contains_key(id)
    }

    /// Write every relay off once so the hardware matches the model.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::LockPoisoned`] if a collector lock is poisoned.
    pub fn initialize(&self) -> Result<(), OrchestratorError> {
        for (id, slot) in &self.collectors {
            let collector = slot.lock(id)?;
            let level = collector.relay_level(Power::Off);
            if let Err(err) = slot.board.write_digital(collector.pin(), level) {
                tracing::warn!(collector = %id, %err, "failed to switch relay off at startup");
            }
        }
        Ok(())
    }

    /// Replace a collector's user set. Never touches the relay.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownCollector`] when `id` is not
    /// managed here, or [`OrchestratorError::LockPoisoned`].
    pub fn update_users(
        &self,
        id: &CollectorId,
        users: BTreeSet<SourceId>,
    ) -> Result<(), OrchestratorError> {
        let slot = self
            .collectors
            .get(id)
            .ok_or_else(|| OrchestratorError::UnknownCollector(id.clone()))?;
        let mut collector = slot.lock(id)?;
        let diff = collector.set_users(users);
        for user in &diff.added {
            tracing::info!(collector = %id, user = %user, "user joined");
        }
        for user in &diff.removed {
            tracing::info!(collector = %id, user = %user, "user left");
        }
        Ok(())
    }

    /// Apply due relay transitions. Returns the collectors that switched.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::LockPoisoned`] if a collector lock is poisoned.
    pub fn tick(&self, now: Instant) -> Result<Vec<(CollectorId, Power)>, OrchestratorError> {
        let mut switched = Vec::new();
        for (id, slot) in &self.collectors {
            let mut collector = slot.lock(id)?;
            let Some(target) = collector.decide(now) else {
                continue;
            };
            if slot.switch(&mut collector, target, now) {
                tracing::info!(
                    collector = %id,
                    relay = ?target,
                    users = collector.users().len(),
                    "collector switched"
                );
                switched.push((id.clone(), target));
            }
        }
        Ok(switched)
    }

    /// Switch every running collector off, ignoring timers. Shutdown only.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::LockPoisoned`] if a collector lock is poisoned.
    pub fn force_all_off(&self, now: Instant) -> Result<(), OrchestratorError> {
        for (id, slot) in &self.collectors {
            let mut collector = slot.lock(id)?;
            collector.set_users(BTreeSet::new());
            if collector.relay().is_on() && slot.switch(&mut collector, Power::Off, now) {
                tracing::info!(collector = %id, "collector forced off");
            }
        }
        Ok(())
    }

    /// Whether a collector is running and past its spin-up delay.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownCollector`] or
    /// [`OrchestratorError::LockPoisoned`].
    pub fn is_ready(&self, id: &CollectorId, now: Instant) -> Result<bool, OrchestratorError> {
        let slot = self
            .collectors
            .get(id)
            .ok_or_else(|| OrchestratorError::UnknownCollector(id.clone()))?;
        Ok(slot.lock(id)?.is_ready(now))
    }

    /// # Errors
    ///
    /// Returns [`OrchestratorError::LockPoisoned`] if a collector lock is poisoned.
    pub fn statuses(&self, now: Instant) -> Result<Vec<EntityStatus>, OrchestratorError> {
        self.collectors
            .iter()
            .map(|(id, slot)| {
                let collector = slot.lock(id)?;
                Ok(EntityStatus::new(
                    id.as_str(),
                    EntityKind::Collector,
                    collector.label(),
                    collector.phase(now).into(),
                ))
            })
            .collect()
    }
}
