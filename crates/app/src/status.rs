//! Status board — the read side of the presentation port.
//!
//! The orchestrator replaces the snapshot at the end of every tick in which
//! something changed; readers get a consistent copy and never block the loop
//! for longer than a clone.

use std::sync::{Arc, PoisonError, RwLock};

use dusthub_domain::error::NotFoundError;
use dusthub_domain::status::{EntityStatus, Snapshot};

#[derive(Clone, Default)]
pub struct StatusBoard {
    snapshot: Arc<RwLock<Snapshot>>,
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A board frozen on `snapshot`, for presentation adapters running
    /// without a control loop.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub(crate) fn replace(&self, snapshot: Snapshot) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Current state of one entity.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if no entity has this id.
    pub fn get_state(&self, id: &str) -> Result<EntityStatus, NotFoundError> {
        self.read(|snapshot| snapshot.get(id).cloned())
            .ok_or_else(|| NotFoundError {
                entity: "Entity",
                id: id.to_string(),
            })
    }

    /// Every entity, ordered by id.
    #[must_use]
    pub fn get_all_states(&self) -> Vec<EntityStatus> {
        self.read(|snapshot| snapshot.entities.values().cloned().collect())
    }

    #[must_use]
    pub fn label(&self, id: &str) -> Option<String> {
        self.read(|snapshot| snapshot.get(id).map(|status| status.label.clone()))
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.read(Clone::clone)
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        f(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dusthub_domain::state::EntityState;
    use dusthub_domain::status::EntityKind;
    use dusthub_domain::time::now;

    fn board() -> StatusBoard {
        let board = StatusBoard::new();
        board.replace(Snapshot::from_statuses(
            [
                EntityStatus::new("saw", EntityKind::Sensor, "Table Saw", EntityState::On),
                EntityStatus::new("main", EntityKind::Collector, "Main", EntityState::SpinningUp),
            ],
            now(),
        ));
        board
    }

    #[test]
    fn should_return_state_of_known_entity() {
        let status = board().get_state("saw").unwrap();
        assert_eq!(status.state, EntityState::On);
    }

    #[test]
    fn should_return_not_found_for_unknown_entity() {
        let err = board().get_state("ghost").unwrap_err();
        assert_eq!(err.to_string(), "Entity ghost not found");
    }

    #[test]
    fn should_list_all_states_ordered_by_id() {
        let ids: Vec<String> = board().get_all_states().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["main", "saw"]);
    }

    #[test]
    fn should_expose_label() {
        assert_eq!(board().label("saw").as_deref(), Some("Table Saw"));
        assert_eq!(board().label("ghost"), None);
    }

    #[test]
    fn should_share_snapshot_between_clones() {
        let a = StatusBoard::new();
        let b = a.clone();
        a.replace(Snapshot::from_statuses(
            [EntityStatus::new("g", EntityKind::Gate, "G", EntityState::Open)],
            now(),
        ));
        assert_eq!(b.get_all_states().len(), 1);
    }
}
