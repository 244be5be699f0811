//! Orchestrator — the periodic control loop.
//!
//! One tick:
//!
//! 1. apply queued manual commands (sensor reset, gate identify)
//! 2. poll every sensor and input
//! 3. when a source changed, or a gate is still short of its target,
//!    recompute each collector's user set and the set of gates that must be
//!    open
//! 4. let the arbiter switch relays whose timers allow it
//! 5. re-derive indicators
//! 6. diff the status snapshot and publish one change event
//!
//! Device failures are absorbed by the services. A bookkeeping failure
//! ([`OrchestratorError`]) stops the loop after driving every output to a
//! safe state.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use dusthub_domain::error::DustHubError;
use dusthub_domain::event::Event;
use dusthub_domain::id::{CollectorId, GateId, SourceId};
use dusthub_domain::status::Snapshot;
use dusthub_domain::time::{self, Instant};

use crate::control::{ControlCommand, ControlHandle};
use crate::error::OrchestratorError;
use crate::ports::EventPublisher;
use crate::services::{
    CollectorArbiter, GateCoordinator, IndicatorPanel, PollReport, SourceMonitor,
};
use crate::shutdown::ShutdownListener;
use crate::status::StatusBoard;

/// Where an active source sends its demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRoute {
    pub collectors: BTreeSet<CollectorId>,
    pub gates: BTreeSet<GateId>,
}

/// Summary of one tick, mainly for tests and tracing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickOutcome {
    pub sources_changed: bool,
    pub gates_moved: Vec<GateId>,
    pub collectors_switched: Vec<CollectorId>,
    pub entities_changed: usize,
}

pub struct Orchestrator<P> {
    sources: SourceMonitor,
    routes: BTreeMap<SourceId, SourceRoute>,
    arbiter: CollectorArbiter,
    gates: GateCoordinator,
    indicators: IndicatorPanel,
    status: StatusBoard,
    publisher: P,
    control: ControlHandle,
    commands: mpsc::Receiver<ControlCommand>,
    previous: Snapshot,
    identify_tasks: Vec<JoinHandle<()>>,
    reroute: bool,
}

impl<P: EventPublisher + Send + Sync> Orchestrator<P> {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: SourceMonitor,
        routes: BTreeMap<SourceId, SourceRoute>,
        arbiter: CollectorArbiter,
        gates: GateCoordinator,
        indicators: IndicatorPanel,
        publisher: P,
        command_capacity: usize,
    ) -> Self {
        let (control, commands) = ControlHandle::channel(command_capacity);
        Self {
            sources,
            routes,
            arbiter,
            gates,
            indicators,
            status: StatusBoard::new(),
            publisher,
            control,
            commands,
            previous: Snapshot::default(),
            identify_tasks: Vec::new(),
            reroute: true,
        }
    }

    /// Handle for reset/identify requests.
    #[must_use]
    pub fn control_handle(&self) -> ControlHandle {
        self.control.clone()
    }

    /// Read side shared with the presentation adapters.
    #[must_use]
    pub fn status_board(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Drive every output to its idle state before the first tick.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on a poisoned collector lock.
    pub fn initialize(&mut self) -> Result<(), OrchestratorError> {
        self.arbiter.initialize()?;
        self.indicators.initialize();
        Ok(())
    }

    /// Run one control cycle at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the loop's own bookkeeping fails;
    /// the caller must then shut down.
    pub async fn tick(&mut self, now: Instant) -> Result<TickOutcome, OrchestratorError> {
        self.apply_commands();

        let report = self.sources.poll(now);
        self.publish_sensor_events(&report).await;

        let mut outcome = TickOutcome {
            sources_changed: report.changed,
            ..TickOutcome::default()
        };

        let active = self.sources.active_sources();
        if report.changed || self.reroute {
            self.route_collectors(&active)?;
            let required = self.required_gates(&active);
            let gates = self.gates.set_active_gates(&required).await;
            // busy or failed gates are retried every tick until they settle
            self.reroute = !gates.is_settled();
            outcome.gates_moved = gates.moved;
        }

        outcome.collectors_switched = self
            .arbiter
            .tick(now)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        self.indicators.refresh(&active);

        outcome.entities_changed = self.publish_status(now).await?;
        Ok(outcome)
    }

    fn route_collectors(&self, active: &BTreeSet<SourceId>) -> Result<(), OrchestratorError> {
        for (source, route) in &self.routes {
            if let Some(unknown) = route.collectors.iter().find(|c| !self.arbiter.contains(c)) {
                tracing::error!(
                    source = %source,
                    collector = %unknown,
                    "route to unmanaged collector"
                );
                return Err(OrchestratorError::UnknownCollector(unknown.clone()));
            }
        }
        for collector in self.arbiter.ids() {
            let users = active
                .iter()
                .filter(|source| {
                    self.routes
                        .get(*source)
                        .is_some_and(|route| route.collectors.contains(collector))
                })
                .cloned()
                .collect();
            self.arbiter.update_users(collector, users)?;
        }
        Ok(())
    }

    fn required_gates(&self, active: &BTreeSet<SourceId>) -> BTreeSet<GateId> {
        active
            .iter()
            .filter_map(|source| self.routes.get(source))
            .flat_map(|route| route.gates.iter().cloned())
            .collect()
    }

    fn apply_commands(&mut self) {
        self.identify_tasks.retain(|task| !task.is_finished());
        while let Ok(command) = self.commands.try_recv() {
            match command {
                ControlCommand::ResetSensor { id, reply } => {
                    let result: Result<bool, DustHubError> =
                        self.sources.reset_sensor(&id).map_err(Into::into);
                    if matches!(result, Ok(true)) {
                        self.reroute = true;
                    }
                    let _ = reply.send(result.map(|_| ()));
                }
                ControlCommand::IdentifyGate { id, reply } => {
                    let result = self.gates.identify(&id).map(|task| {
                        self.identify_tasks.push(task);
                    });
                    let _ = reply.send(result);
                }
            }
        }
    }

    async fn publish_sensor_events(&self, report: &PollReport) {
        let at = time::now();
        for (sensor, calibration) in &report.calibrated {
            self.publish(Event::SensorCalibrated {
                sensor: sensor.clone(),
                baseline: calibration.baseline,
                threshold: calibration.threshold,
                at,
            })
            .await;
        }
        for (sensor, errors) in &report.faulted {
            self.publish(Event::SensorFaulted {
                sensor: sensor.clone(),
                errors: *errors,
                at,
            })
            .await;
        }
    }

    async fn publish_status(&mut self, now: Instant) -> Result<usize, OrchestratorError> {
        let snapshot = self.snapshot(now)?;
        let changed = snapshot.diff(&self.previous);
        let count = changed.len();
        if !changed.is_empty() {
            self.status.replace(snapshot.clone());
            self.publish(Event::StatusChanged {
                changed,
                at: snapshot.updated_at,
            })
            .await;
        }
        self.previous = snapshot;
        Ok(count)
    }

    fn snapshot(&self, now: Instant) -> Result<Snapshot, OrchestratorError> {
        let statuses = self
            .sources
            .statuses()
            .into_iter()
            .chain(self.arbiter.statuses(now)?)
            .chain(self.gates.statuses())
            .chain(self.indicators.statuses());
        Ok(Snapshot::from_statuses(statuses, time::now()))
    }

    async fn publish(&self, event: Event) {
        let kind = event.kind();
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(%err, event = kind, "failed to publish event");
        }
    }

    /// Stop identify sweeps and drive every output to a safe state.
    pub async fn shutdown_outputs(&mut self, now: Instant) {
        for task in self.identify_tasks.drain(..) {
            task.abort();
        }
        if let Err(err) = self.arbiter.force_all_off(now) {
            tracing::error!(%err, "could not force collectors off");
        }
        let closed = self.gates.close_all().await;
        if !closed.moved.is_empty() {
            tracing::info!(gates = closed.moved.len(), "gates closed");
        }
        if !closed.is_settled() {
            tracing::warn!(gates = ?closed.pending, "gates left in place");
        }
        self.indicators.all_off();
        self.publish(Event::Shutdown { at: time::now() }).await;
    }

    /// Tick every `period` until `shutdown` fires or bookkeeping fails.
    ///
    /// Outputs are driven to a safe state on the way out in both cases.
    ///
    /// # Errors
    ///
    /// Returns the [`OrchestratorError`] that stopped the loop.
    pub async fn run(
        mut self,
        period: Duration,
        mut shutdown: ShutdownListener,
    ) -> Result<(), OrchestratorError> {
        self.initialize()?;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(?period, "control loop started");

        let result = loop {
            tokio::select! {
                () = shutdown.wait() => break Ok(()),
                _ = interval.tick() => {
                    let now = tokio::time::Instant::now().into_std();
                    if let Err(err) = self.tick(now).await {
                        tracing::error!(%err, "control loop bookkeeping failed, shutting down");
                        break Err(err);
                    }
                }
            }
        };

        self.shutdown_outputs(tokio::time::Instant::now().into_std())
            .await;
        tracing::info!("control loop stopped");
        result
    }
}
