//! Composition of an [`Orchestrator`] from the static topology.
//!
//! Entities whose board is missing, lacks the needed capability, or cannot
//! serve the configured pin are skipped with a warning; everything else
//! still starts. Invalid values (duplicate ids, bad windows, bad angles)
//! abort the build.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use dusthub_domain::collector::Collector;
use dusthub_domain::error::DustHubError;
use dusthub_domain::gate::{Gate, ServoProfile};
use dusthub_domain::id::{BoardId, CollectorId, GateId, SourceId};
use dusthub_domain::indicator::{Color, Indicator};
use dusthub_domain::input::DebouncedInput;
use dusthub_domain::sensor::{ActivitySensor, SensorSettings};
use dusthub_domain::time::Instant;
use dusthub_domain::topology::{Capability, Preferences, Topology};

use crate::orchestrator::{Orchestrator, SourceRoute};
use crate::ports::{BoardHandle, BoardRegistry, EventPublisher};
use crate::services::{
    CollectorArbiter, GateCoordinator, IdentifySettings, IndicatorPanel, SourceMonitor,
};

/// Step-by-step builder for [`Orchestrator`].
#[derive(Debug)]
pub struct OrchestratorBuilder<'a> {
    topology: &'a Topology,
    registry: &'a BoardRegistry,
    sensor_defaults: SensorSettings,
    gate_settle: Duration,
    identify: IdentifySettings,
    command_capacity: usize,
}

impl<'a> OrchestratorBuilder<'a> {
    #[must_use]
    pub fn new(topology: &'a Topology, registry: &'a BoardRegistry) -> Self {
        Self {
            topology,
            registry,
            sensor_defaults: SensorSettings::default(),
            gate_settle: Duration::from_millis(100),
            identify: IdentifySettings::default(),
            command_capacity: 16,
        }
    }

    /// Settings used by sensors that do not override them.
    #[must_use]
    pub fn sensor_defaults(mut self, defaults: SensorSettings) -> Self {
        self.sensor_defaults = defaults;
        self
    }

    /// Delay between a servo move and releasing its PWM output.
    #[must_use]
    pub fn gate_settle(mut self, settle: Duration) -> Self {
        self.gate_settle = settle;
        self
    }

    #[must_use]
    pub fn identify(mut self, identify: IdentifySettings) -> Self {
        self.identify = identify;
        self
    }

    #[must_use]
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity.max(1);
        self
    }

    /// Build the orchestrator. `started_at` seeds every collector's
    /// last-off time.
    ///
    /// # Errors
    ///
    /// Returns [`DustHubError::Validation`] if the topology is invalid.
    pub fn build<P: EventPublisher + Send + Sync>(
        self,
        publisher: P,
        started_at: Instant,
    ) -> Result<Orchestrator<P>, DustHubError> {
        let topology = self.topology;
        topology.validate(&self.sensor_defaults)?;
        for mismatch in topology.unknown_references() {
            tracing::warn!(%mismatch, "ignoring preference entry");
        }

        let arbiter = self.collectors(started_at);
        let gates = self.gates()?;
        let sources = self.sources()?;
        let indicators = self.indicators()?;
        let routes = self.routes(&sources, &arbiter, &gates);

        tracing::info!(
            sensors = topology.sensors.len(),
            inputs = topology.inputs.len(),
            collectors = topology.collectors.len(),
            gates = topology.gates.len(),
            indicators = topology.indicators.len(),
            routed_sources = routes.len(),
            "orchestrator assembled"
        );

        Ok(Orchestrator::new(
            sources,
            routes,
            arbiter,
            gates,
            indicators,
            publisher,
            self.command_capacity,
        ))
    }

    fn resolve(
        &self,
        entity: &str,
        board: &BoardId,
        capability: Capability,
        pins: &[u8],
    ) -> Option<BoardHandle> {
        match self.registry.require(entity, board, capability, pins) {
            Ok(handle) => Some(handle),
            Err(mismatch) => {
                tracing::warn!(%mismatch, "skipping entity");
                None
            }
        }
    }

    fn collectors(&self, started_at: Instant) -> CollectorArbiter {
        let mut arbiter = CollectorArbiter::new();
        for def in &self.topology.collectors {
            let Some(board) =
                self.resolve(def.id.as_str(), &def.board, Capability::DigitalIo, &[def.pin])
            else {
                continue;
            };
            let collector = Collector::new(
                def.id.clone(),
                label_or_id(&def.label, def.id.as_str()),
                def.board.clone(),
                def.pin,
                def.timing(),
                started_at,
            )
            .with_active_low(def.active_low);
            arbiter.add(collector, board);
        }
        arbiter
    }

    fn gates(&self) -> Result<GateCoordinator, DustHubError> {
        let mut coordinator = GateCoordinator::new(self.gate_settle, self.identify);
        for def in &self.topology.gates {
            let Some(board) =
                self.resolve(def.id.as_str(), &def.board, Capability::PwmOut, &[def.pin])
            else {
                continue;
            };
            let frequency = board
                .pwm_frequency()
                .or_else(|| self.topology.board(&def.board).map(|b| b.pwm_frequency_hz))
                .unwrap_or(50.0);
            let gate = Gate::new(
                def.id.clone(),
                label_or_id(&def.label, def.id.as_str()),
                def.board.clone(),
                def.pin,
                def.min_angle,
                def.max_angle,
                def.initial,
            )?;
            coordinator.add(gate, board, ServoProfile::default().with_frequency(frequency));
        }
        Ok(coordinator)
    }

    fn sources(&self) -> Result<SourceMonitor, DustHubError> {
        let mut monitor = SourceMonitor::new();
        for def in &self.topology.sensors {
            let Some(board) =
                self.resolve(def.id.as_str(), &def.board, Capability::AnalogIn, &[def.pin])
            else {
                continue;
            };
            let sensor = ActivitySensor::new(
                def.id.clone(),
                label_or_id(&def.label, def.id.as_str()),
                def.board.clone(),
                def.pin,
                def.settings(&self.sensor_defaults),
            )?;
            monitor.add_sensor(sensor, board);
        }
        for def in &self.topology.inputs {
            let Some(board) =
                self.resolve(def.id.as_str(), &def.board, Capability::DigitalIo, &[def.pin])
            else {
                continue;
            };
            let input = DebouncedInput::new(
                def.id.clone(),
                label_or_id(&def.label, def.id.as_str()),
                def.board.clone(),
                def.pin,
                def.debounce(),
            )
            .with_active_low(def.active_low)
            .with_mode(def.mode);
            monitor.add_input(input, board);
        }
        Ok(monitor)
    }

    fn indicators(&self) -> Result<IndicatorPanel, DustHubError> {
        let mut panel = IndicatorPanel::new();
        for def in &self.topology.indicators {
            let pins = def.rgb_pins()?;
            let Some(board) =
                self.resolve(def.id.as_str(), &def.board, Capability::PwmOut, &pins)
            else {
                continue;
            };
            let indicator = Indicator::new(
                def.id.clone(),
                label_or_id(&def.label, def.id.as_str()),
                def.board.clone(),
                pins,
                def.listens_to.clone(),
            )
            .with_colors(
                def.on_color.unwrap_or(Color::WHITE),
                def.off_color.unwrap_or(Color::BLACK),
            );
            panel.add(indicator, board);
        }
        Ok(panel)
    }

    fn routes(
        &self,
        sources: &SourceMonitor,
        arbiter: &CollectorArbiter,
        gates: &GateCoordinator,
    ) -> BTreeMap<SourceId, SourceRoute> {
        let preferences = self
            .topology
            .sensors
            .iter()
            .map(|s| (&s.id, &s.preferences))
            .chain(self.topology.inputs.iter().map(|i| (&i.id, &i.preferences)));

        let built: BTreeSet<&SourceId> = sources.source_ids().collect();
        preferences
            .filter(|(id, _)| built.contains(id))
            .map(|(id, prefs)| (id.clone(), route_for(prefs, arbiter, gates)))
            .collect()
    }
}

fn route_for(
    prefs: &Preferences,
    arbiter: &CollectorArbiter,
    gates: &GateCoordinator,
) -> SourceRoute {
    let collectors: BTreeSet<CollectorId> = match &prefs.collectors {
        Some(listed) => listed.iter().filter(|c| arbiter.contains(c)).cloned().collect(),
        None => arbiter.ids().cloned().collect(),
    };
    let gates: BTreeSet<GateId> = prefs
        .gates
        .iter()
        .filter(|g| gates.contains(g))
        .cloned()
        .collect();
    SourceRoute { collectors, gates }
}

fn label_or_id(label: &str, id: &str) -> String {
    if label.is_empty() {
        id.to_string()
    } else {
        label.to_string()
    }
}
