//! Externally visible state of every entity, as served by the status port.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::EntityState;
use crate::time::{self, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sensor,
    Input,
    Collector,
    Gate,
    Indicator,
}

/// State of one entity at the end of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStatus {
    pub id: String,
    pub kind: EntityKind,
    pub label: String,
    pub state: EntityState,
}

impl EntityStatus {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: EntityKind,
        label: impl Into<String>,
        state: EntityState,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            state,
        }
    }
}

/// States of all entities, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entities: BTreeMap<String, EntityStatus>,
    pub updated_at: Timestamp,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            updated_at: time::now(),
        }
    }
}

impl Snapshot {
    #[must_use]
    pub fn from_statuses(statuses: impl IntoIterator<Item = EntityStatus>, at: Timestamp) -> Self {
        Self {
            entities: statuses.into_iter().map(|s| (s.id.clone(), s)).collect(),
            updated_at: at,
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&EntityStatus> {
        self.entities.get(id)
    }

    /// Entities whose state differs from `previous`, or that are new.
    #[must_use]
    pub fn diff(&self, previous: &Snapshot) -> Vec<EntityStatus> {
        self.entities
            .values()
            .filter(|status| {
                previous
                    .entities
                    .get(&status.id)
                    .is_none_or(|prev| prev.state != status.state)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(states: &[(&str, EntityState)]) -> Snapshot {
        Snapshot::from_statuses(
            states
                .iter()
                .map(|(id, state)| EntityStatus::new(*id, EntityKind::Sensor, *id, *state)),
            time::now(),
        )
    }

    #[test]
    fn should_report_only_changed_entities() {
        let before = snapshot(&[("saw", EntityState::Off), ("planer", EntityState::Off)]);
        let after = snapshot(&[("saw", EntityState::On), ("planer", EntityState::Off)]);

        let changed = after.diff(&before);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, "saw");
        assert_eq!(changed[0].state, EntityState::On);
    }

    #[test]
    fn should_report_everything_against_empty_snapshot() {
        let after = snapshot(&[("saw", EntityState::Calibrating)]);
        assert_eq!(after.diff(&Snapshot::default()).len(), 1);
    }

    #[test]
    fn should_report_nothing_for_identical_states() {
        let a = snapshot(&[("saw", EntityState::Off)]);
        let b = snapshot(&[("saw", EntityState::Off)]);
        assert!(b.diff(&a).is_empty());
    }

    #[test]
    fn should_serialize_entity_status_as_json() {
        let status =
            EntityStatus::new("main", EntityKind::Collector, "Main", EntityState::SpinningUp);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["kind"], "collector");
        assert_eq!(json["state"], "spinning_up");
    }
}
