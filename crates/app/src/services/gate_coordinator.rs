//! Gate coordinator — reconciles requested gates with servo positions.
//!
//! A servo is only commanded when a gate's logical status changes, and its
//! PWM output is zeroed after a short settle delay so the servo neither hums
//! nor heats up holding position.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use dusthub_domain::error::{DustHubError, HardwareError, NotFoundError};
use dusthub_domain::gate::{Gate, GateStatus, ServoProfile};
use dusthub_domain::id::GateId;
use dusthub_domain::state::EntityState;
use dusthub_domain::status::{EntityKind, EntityStatus};

use crate::ports::BoardHandle;

/// Servo sweep used to locate a gate physically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentifySettings {
    pub sweeps: u32,
    pub low_angle: f64,
    pub high_angle: f64,
    pub step: Duration,
}

impl Default for IdentifySettings {
    fn default() -> Self {
        Self {
            sweeps: 20,
            low_angle: 80.0,
            high_angle: 100.0,
            step: Duration::from_millis(200),
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GateReport {
    /// Gates commanded to their target position.
    pub moved: Vec<GateId>,
    /// Gates left short of their target: busy identifying, or the write failed.
    pub pending: Vec<GateId>,
}

impl GateReport {
    /// Every gate reached its target.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }
}

struct GateSlot {
    gate: Arc<Mutex<Gate>>,
    board: BoardHandle,
    profile: ServoProfile,
    label: String,
}

pub struct GateCoordinator {
    gates: BTreeMap<GateId, GateSlot>,
    settle: Duration,
    identify: IdentifySettings,
}

impl Default for GateCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), IdentifySettings::default())
    }
}

impl GateCoordinator {
    #[must_use]
    pub fn new(settle: Duration, identify: IdentifySettings) -> Self {
        Self {
            gates: BTreeMap::new(),
            settle,
            identify,
        }
    }

    pub fn add(&mut self, gate: Gate, board: BoardHandle, profile: ServoProfile) {
        self.gates.insert(
            gate.id().clone(),
            GateSlot {
                label: gate.label().to_string(),
                gate: Arc::new(Mutex::new(gate)),
                board,
                profile,
            },
        );
    }

    pub fn ids(&self) -> impl Iterator<Item = &GateId> {
        self.gates.keys()
    }

    #[must_use]
    pub fn contains(&self, id: &GateId) -> bool {
        self.gates.contains_key(id)
    }

    /// Open exactly the requested gates and close all others.
    ///
    /// An empty request holds the current configuration. Gates busy
    /// identifying, and gates whose write failed, are reported as pending so
    /// the caller can repeat the request.
    pub async fn set_active_gates(&self, requested: &BTreeSet<GateId>) -> GateReport {
        if requested.is_empty() {
            tracing::debug!("no gate requested, holding current positions");
            return GateReport::default();
        }
        self.reconcile(|id| {
            if requested.contains(id) {
                GateStatus::Open
            } else {
                GateStatus::Closed
            }
        })
        .await
    }

    /// Close every open gate. Shutdown only.
    pub async fn close_all(&self) -> GateReport {
        self.reconcile(|_| GateStatus::Closed).await
    }

    async fn reconcile(&self, desired: impl Fn(&GateId) -> GateStatus) -> GateReport {
        let mut report = GateReport::default();
        for (id, slot) in &self.gates {
            let Ok(mut gate) = slot.gate.try_lock() else {
                tracing::debug!(gate = %id, "gate busy identifying, skipped");
                report.pending.push(id.clone());
                continue;
            };
            let target = desired(id);
            if !gate.needs_move(target) {
                continue;
            }
            let duty = slot.profile.duty_for_angle(gate.angle_for(target));
            match slot.board.write_pwm_duty(gate.pin(), duty) {
                Ok(()) => {
                    gate.set_status(target);
                    tracing::info!(gate = %id, status = ?target, duty, "gate moved");
                    report.moved.push(id.clone());
                }
                Err(err) => {
                    tracing::warn!(gate = %id, status = ?target, %err, "gate write failed");
                    report.pending.push(id.clone());
                }
            }
        }

        if report.moved.is_empty() {
            return report;
        }
        tokio::time::sleep(self.settle).await;
        for id in &report.moved {
            let Some(slot) = self.gates.get(id) else {
                continue;
            };
            let Ok(gate) = slot.gate.try_lock() else {
                continue;
            };
            if let Err(err) = slot.board.write_pwm_duty(gate.pin(), 0) {
                tracing::warn!(gate = %id, %err, "failed to release servo");
            }
        }
        report
    }

    /// Sweep a gate back and forth in the background, then restore its last
    /// commanded position.
    ///
    /// # Errors
    ///
    /// Returns [`DustHubError::NotFound`] if no gate has this id and
    /// [`DustHubError::Unavailable`] while the gate is still identifying.
    pub fn identify(&self, id: &GateId) -> Result<JoinHandle<()>, DustHubError> {
        let slot = self.gates.get(id).ok_or_else(|| NotFoundError {
            entity: "Gate",
            id: id.to_string(),
        })?;
        let Ok(gate) = Arc::clone(&slot.gate).try_lock_owned() else {
            tracing::debug!(gate = %id, "gate already identifying");
            return Err(DustHubError::Unavailable);
        };
        let board = Arc::clone(&slot.board);
        let profile = slot.profile;
        let settings = self.identify;
        let settle = self.settle;
        let id = id.clone();

        Ok(tokio::spawn(async move {
            tracing::info!(gate = %id, sweeps = settings.sweeps, "identifying gate");
            if let Err(err) = sweep(&board, &gate, profile, settings).await {
                tracing::warn!(gate = %id, %err, "identify sweep aborted");
            }
            let restore = profile.duty_for_angle(gate.angle_for(gate.status()));
            let result = board.write_pwm_duty(gate.pin(), restore);
            tokio::time::sleep(settle).await;
            if let Err(err) = result.and_then(|()| board.write_pwm_duty(gate.pin(), 0)) {
                tracing::warn!(gate = %id, %err, "failed to restore gate after identify");
            }
        }))
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<EntityStatus> {
        self.gates
            .iter()
            .map(|(id, slot)| {
                let state = slot
                    .gate
                    .try_lock()
                    .map_or(EntityState::Unavailable, |gate| gate.status().into());
                EntityStatus::new(id.as_str(), EntityKind::Gate, slot.label.as_str(), state)
            })
            .collect()
    }
}

async fn sweep(
    board: &BoardHandle,
    gate: &Gate,
    profile: ServoProfile,
    settings: IdentifySettings,
) -> Result<(), HardwareError> {
    let low = profile.duty_for_angle(settings.low_angle);
    let high = profile.duty_for_angle(settings.high_angle);
    for _ in 0..settings.sweeps {
        board.write_pwm_duty(gate.pin(), low)?;
        tokio::time::sleep(settings.step).await;
        board.write_pwm_duty(gate.pin(), high)?;
        tokio::time::sleep(settings.step).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBoard;
    use dusthub_domain::id::BoardId;
    use dusthub_domain::topology::Capability;

    fn gate(id: &str, pin: u8) -> Gate {
        Gate::new(
            GateId::new(id),
            id,
            BoardId::new("servos"),
            pin,
            0.0,
            180.0,
            GateStatus::Closed,
        )
        .unwrap()
    }

    fn coordinator() -> (GateCoordinator, Arc<FakeBoard>) {
        let board = FakeBoard::new("servos", &[Capability::PwmOut]).into_handle();
        let mut coordinator = GateCoordinator::new(
            Duration::from_millis(100),
            IdentifySettings {
                sweeps: 2,
                ..IdentifySettings::default()
            },
        );
        coordinator.add(gate("g_saw", 0), board.clone(), ServoProfile::default());
        coordinator.add(gate("g_planer", 1), board.clone(), ServoProfile::default());
        (coordinator, board)
    }

    fn set(ids: &[&str]) -> BTreeSet<GateId> {
        ids.iter().map(|id| GateId::new(*id)).collect()
    }

    fn status_of(coordinator: &GateCoordinator, id: &str) -> EntityState {
        coordinator
            .statuses()
            .into_iter()
            .find(|s| s.id == id)
            .unwrap()
            .state
    }

    #[tokio::test(start_paused = true)]
    async fn should_open_requested_gate_then_release_pwm() {
        let (coordinator, board) = coordinator();

        let report = coordinator.set_active_gates(&set(&["g_saw"])).await;

        assert_eq!(report.moved, vec![GateId::new("g_saw")]);
        assert!(report.is_settled());
        let open_duty = ServoProfile::default().duty_for_angle(180.0);
        assert_eq!(board.pwm_writes(), vec![(0, open_duty), (0, 0)]);
        assert_eq!(status_of(&coordinator, "g_saw"), EntityState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn should_issue_no_writes_for_identical_request() {
        let (coordinator, board) = coordinator();
        coordinator.set_active_gates(&set(&["g_saw"])).await;
        board.clear_writes();

        let report = coordinator.set_active_gates(&set(&["g_saw"])).await;

        assert_eq!(report, GateReport::default());
        assert!(board.pwm_writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_close_gates_not_in_request() {
        let (coordinator, board) = coordinator();
        coordinator.set_active_gates(&set(&["g_saw"])).await;
        board.clear_writes();

        let report = coordinator.set_active_gates(&set(&["g_planer"])).await;

        assert_eq!(report.moved, vec![GateId::new("g_planer"), GateId::new("g_saw")]);
        assert_eq!(status_of(&coordinator, "g_saw"), EntityState::Closed);
        assert_eq!(status_of(&coordinator, "g_planer"), EntityState::Open);
        let zeroed = board.pwm_writes().iter().filter(|(_, d)| *d == 0).count();
        assert_eq!(zeroed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_hold_configuration_on_empty_request() {
        let (coordinator, board) = coordinator();
        coordinator.set_active_gates(&set(&["g_saw"])).await;
        board.clear_writes();

        let report = coordinator.set_active_gates(&BTreeSet::new()).await;

        assert_eq!(report, GateReport::default());
        assert!(board.pwm_writes().is_empty());
        assert_eq!(status_of(&coordinator, "g_saw"), EntityState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_failed_write_as_pending_and_retry_later() {
        let (coordinator, board) = coordinator();
        board.fail_writes(true);
        let report = coordinator.set_active_gates(&set(&["g_saw"])).await;
        assert!(report.moved.is_empty());
        assert_eq!(report.pending, vec![GateId::new("g_saw")]);
        assert_eq!(status_of(&coordinator, "g_saw"), EntityState::Closed);

        board.fail_writes(false);
        let report = coordinator.set_active_gates(&set(&["g_saw"])).await;
        assert_eq!(report.moved, vec![GateId::new("g_saw")]);
        assert!(report.is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn should_close_every_open_gate() {
        let (coordinator, _board) = coordinator();
        coordinator.set_active_gates(&set(&["g_saw", "g_planer"])).await;

        let report = coordinator.close_all().await;

        assert_eq!(report.moved.len(), 2);
        assert_eq!(status_of(&coordinator, "g_saw"), EntityState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn should_sweep_and_restore_on_identify() {
        let (coordinator, board) = coordinator();

        coordinator
            .identify(&GateId::new("g_saw"))
            .unwrap()
            .await
            .unwrap();

        let profile = ServoProfile::default();
        let low = profile.duty_for_angle(80.0);
        let high = profile.duty_for_angle(100.0);
        let closed = profile.duty_for_angle(0.0);
        assert_eq!(
            board.pwm_writes(),
            vec![(0, low), (0, high), (0, low), (0, high), (0, closed), (0, 0)]
        );
        assert_eq!(status_of(&coordinator, "g_saw"), EntityState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_gate_busy_identifying_as_pending() {
        let (coordinator, board) = coordinator();
        let task = coordinator.identify(&GateId::new("g_saw")).unwrap();

        let report = coordinator.set_active_gates(&set(&["g_saw"])).await;
        assert!(report.moved.is_empty());
        assert_eq!(report.pending, vec![GateId::new("g_saw")]);
        assert_eq!(status_of(&coordinator, "g_saw"), EntityState::Unavailable);

        task.await.unwrap();
        board.clear_writes();
        let report = coordinator.set_active_gates(&set(&["g_saw"])).await;
        assert_eq!(report.moved, vec![GateId::new("g_saw")]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_refuse_second_identify_while_sweeping() {
        let (coordinator, board) = coordinator();
        let task = coordinator.identify(&GateId::new("g_saw")).unwrap();

        let err = coordinator.identify(&GateId::new("g_saw")).unwrap_err();
        assert!(matches!(err, DustHubError::Unavailable));

        task.await.unwrap();
        assert_eq!(board.pwm_writes().len(), 6);
        assert!(coordinator.identify(&GateId::new("g_saw")).is_ok());
    }

    #[test]
    fn should_return_not_found_for_unknown_gate() {
        let (coordinator, _board) = coordinator();
        let err = coordinator.identify(&GateId::new("ghost")).unwrap_err();
        assert!(matches!(err, DustHubError::NotFound(ref e) if e.entity == "Gate"));
    }
}
