//! End-to-end tests for the full dusthubd stack.
//!
//! Each test wires simulated boards, the orchestrator and the axum router
//! exactly like the daemon does, drives ticks by hand with explicit
//! instants, and observes the result through the HTTP layer via
//! `tower::ServiceExt::oneshot`, so no TCP port is bound.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use dusthub_adapter_http_axum::router;
use dusthub_adapter_http_axum::state::AppState;
use dusthub_adapter_virtual::{Signal, VirtualBoard};
use dusthub_app::builder::OrchestratorBuilder;
use dusthub_app::event_bus::InProcessEventBus;
use dusthub_app::orchestrator::Orchestrator;
use dusthub_app::ports::{BoardHandle, BoardRegistry};
use dusthub_app::shutdown::ShutdownSignal;
use dusthub_domain::state::EntityState;
use dusthub_domain::topology::Topology;

const WORKSHOP: &str = r#"
    [[boards]]
    id = "adc0"
    kind = "ads1115"
    max_samples = 50

    [[boards]]
    id = "relays"
    kind = "mcp23017"

    [[boards]]
    id = "servos"
    kind = "pca9685"

    [[sensors]]
    id = "saw"
    label = "Table Saw"
    board = "adc0"
    pin = 0
    gates = ["gate_saw"]

    [[sensors]]
    id = "planer"
    label = "Planer"
    board = "adc0"
    pin = 1
    gates = ["gate_planer"]

    [[collectors]]
    id = "main"
    label = "Main Collector"
    board = "relays"
    pin = 0
    spin_up_secs = 5.0
    minimum_run_secs = 10.0
    cool_down_secs = 30.0

    [[gates]]
    id = "gate_saw"
    board = "servos"
    pin = 0

    [[gates]]
    id = "gate_planer"
    board = "servos"
    pin = 1

    [[indicators]]
    id = "led_saw"
    board = "servos"
    pins = [4, 5, 6]
    listens_to = ["saw"]
"#;

/// Idle current transformer: σ ≈ 0.01 V.
const IDLE: Signal = Signal::Alternating {
    center: 1.65,
    amplitude: 0.01,
};

/// Tool running: σ ≈ 0.05 V, above τ = 3 · 0.01 V.
const BURST: Signal = Signal::Alternating {
    center: 1.65,
    amplitude: 0.05,
};

const WINDOW: usize = 50;

struct Workshop {
    orchestrator: Orchestrator<Arc<InProcessEventBus>>,
    app: axum::Router,
    adc: Arc<VirtualBoard>,
    relays: Arc<VirtualBoard>,
    t0: Instant,
}

impl Workshop {
    fn new() -> Self {
        let topology: Topology = toml::from_str(WORKSHOP).expect("topology should parse");
        let mut registry = BoardRegistry::new();
        let mut boards = Vec::new();
        for definition in &topology.boards {
            let board = Arc::new(VirtualBoard::from_definition(definition));
            registry.register(Arc::clone(&board) as BoardHandle);
            boards.push(board);
        }
        let adc = Arc::clone(&boards[0]);
        let relays = Arc::clone(&boards[1]);

        let t0 = Instant::now();
        let event_bus = Arc::new(InProcessEventBus::new(64));
        let orchestrator = OrchestratorBuilder::new(&topology, &registry)
            .build(Arc::clone(&event_bus), t0)
            .expect("orchestrator should build");
        let app = router::build(AppState::new(
            orchestrator.status_board(),
            orchestrator.control_handle(),
            event_bus,
        ));

        let mut workshop = Self {
            orchestrator,
            app,
            adc,
            relays,
            t0,
        };
        workshop
            .orchestrator
            .initialize()
            .expect("outputs should initialise");
        workshop
    }

    /// Put `signal` on `pin` and record one full window on every pin.
    fn feed(&self, pin: u8, signal: Signal) {
        self.adc.set_signal(pin, signal);
        for _ in 0..WINDOW {
            self.adc.sample_once();
        }
    }

    async fn tick_at(&mut self, secs: u64) {
        self.orchestrator
            .tick(self.t0 + Duration::from_secs(secs))
            .await
            .expect("tick should succeed");
    }

    async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = self
            .app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn state(&self, id: &str) -> String {
        let (status, body) = self.get(&format!("/api/states/{id}")).await;
        assert_eq!(status, StatusCode::OK, "state of {id}");
        body["state"].as_str().unwrap().to_string()
    }
}

async fn post(app: &axum::Router, uri: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let workshop = Workshop::new();
    let response = workshop
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Control loop scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_run_tool_session_from_calibration_to_collector_stop() {
    let mut workshop = Workshop::new();

    // calibration on an idle tool
    workshop.feed(0, IDLE);
    workshop.feed(1, IDLE);
    workshop.tick_at(0).await;
    assert_eq!(workshop.state("saw").await, "off");
    assert_eq!(workshop.state("gate_saw").await, "closed");
    assert_eq!(workshop.state("led_saw").await, "off");
    assert_eq!(workshop.state("main").await, "cooling_down");

    // burst: sensor, gate and indicator react at once
    workshop.feed(0, BURST);
    workshop.tick_at(1).await;
    assert_eq!(workshop.state("saw").await, "on");
    assert_eq!(workshop.state("gate_saw").await, "open");
    assert_eq!(workshop.state("led_saw").await, "on");
    assert_eq!(workshop.state("main").await, "cooling_down");
    assert_eq!(workshop.relays.last_digital_write(0), Some(false));

    // collector waits for the cool-down since startup
    workshop.tick_at(31).await;
    assert_eq!(workshop.state("main").await, "spinning_up");
    assert_eq!(workshop.relays.last_digital_write(0), Some(true));

    workshop.tick_at(37).await;
    assert_eq!(workshop.state("main").await, "on");

    // burst ends: collector keeps running for its minimum run
    workshop.feed(0, IDLE);
    workshop.tick_at(38).await;
    assert_eq!(workshop.state("saw").await, "off");
    assert_eq!(workshop.state("led_saw").await, "off");
    assert_eq!(workshop.state("main").await, "on");
    assert_eq!(workshop.relays.last_digital_write(0), Some(true));

    workshop.tick_at(41).await;
    assert_eq!(workshop.state("main").await, "cooling_down");
    assert_eq!(workshop.relays.last_digital_write(0), Some(false));
}

#[tokio::test(start_paused = true)]
async fn should_hold_gate_open_when_no_source_is_active() {
    let mut workshop = Workshop::new();
    workshop.feed(0, IDLE);
    workshop.feed(1, IDLE);
    workshop.tick_at(0).await;

    workshop.feed(0, BURST);
    workshop.tick_at(1).await;
    assert_eq!(workshop.state("gate_saw").await, "open");

    workshop.feed(0, IDLE);
    workshop.tick_at(2).await;
    assert_eq!(workshop.state("saw").await, "off");
    assert_eq!(workshop.state("gate_saw").await, "open");
    assert_eq!(workshop.state("gate_planer").await, "closed");
}

#[tokio::test(start_paused = true)]
async fn should_close_gate_when_another_source_takes_over() {
    let mut workshop = Workshop::new();
    workshop.feed(0, IDLE);
    workshop.feed(1, IDLE);
    workshop.tick_at(0).await;

    workshop.feed(0, BURST);
    workshop.tick_at(1).await;
    workshop.feed(1, BURST);
    workshop.tick_at(2).await;
    assert_eq!(workshop.state("gate_saw").await, "open");
    assert_eq!(workshop.state("gate_planer").await, "open");

    workshop.feed(0, IDLE);
    workshop.tick_at(3).await;
    assert_eq!(workshop.state("saw").await, "off");
    assert_eq!(workshop.state("planer").await, "on");
    assert_eq!(workshop.state("gate_saw").await, "closed");
    assert_eq!(workshop.state("gate_planer").await, "open");
}

#[tokio::test(start_paused = true)]
async fn should_report_faulted_sensor_after_repeated_read_failures() {
    let mut workshop = Workshop::new();
    workshop.feed(0, IDLE);
    workshop.feed(1, IDLE);
    workshop.tick_at(0).await;

    workshop.adc.fail_reads(true);
    for secs in 1..=5 {
        workshop.tick_at(secs).await;
    }
    assert_eq!(workshop.state("saw").await, "faulted");
    assert_eq!(workshop.state("planer").await, "faulted");
    assert_eq!(workshop.state("gate_saw").await, "closed");
}

// ---------------------------------------------------------------------------
// Status queries and manual commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_list_every_configured_entity_with_labels() {
    let mut workshop = Workshop::new();
    workshop.tick_at(0).await;

    let (status, body) = workshop.get("/api/states").await;
    assert_eq!(status, StatusCode::OK);
    let entities = body.as_array().unwrap();
    assert_eq!(entities.len(), 6);

    let (_, saw) = workshop.get("/api/states/saw").await;
    assert_eq!(saw["label"], "Table Saw");
    assert_eq!(saw["kind"], "sensor");
    assert_eq!(saw["state"], "uninitialized");

    let (_, gate) = workshop.get("/api/states/gate_saw").await;
    assert_eq!(gate["label"], "gate_saw");
}

#[tokio::test]
async fn should_return_not_found_for_unknown_entity() {
    let workshop = Workshop::new();
    let (status, body) = workshop.get("/api/states/bandsaw").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("bandsaw"));
}

#[tokio::test(start_paused = true)]
async fn should_reset_sensor_through_running_control_loop() {
    let workshop = Workshop::new();
    workshop.feed(0, IDLE);
    workshop.feed(1, IDLE);
    let Workshop {
        orchestrator,
        app,
        ..
    } = workshop;
    let status = orchestrator.status_board();
    let signal = ShutdownSignal::new();
    let task = tokio::spawn(orchestrator.run(Duration::from_millis(100), signal.listener()));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(status.get_state("saw").unwrap().state, EntityState::Off);

    assert_eq!(post(&app, "/api/sensors/saw/reset").await, StatusCode::NO_CONTENT);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        status.get_state("saw").unwrap().state,
        EntityState::Uninitialized
    );

    assert_eq!(post(&app, "/api/sensors/bandsaw/reset").await, StatusCode::NOT_FOUND);
    assert_eq!(post(&app, "/api/gates/gate_saw/identify").await, StatusCode::ACCEPTED);
    assert_eq!(
        post(&app, "/api/gates/gate_saw/identify").await,
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(post(&app, "/api/gates/ghost/identify").await, StatusCode::NOT_FOUND);

    signal.trigger();
    task.await.unwrap().unwrap();

    assert_eq!(
        post(&app, "/api/sensors/saw/reset").await,
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test(start_paused = true)]
async fn should_force_collector_off_on_shutdown() {
    let workshop = Workshop::new();
    workshop.feed(0, IDLE);
    workshop.feed(1, IDLE);
    let Workshop {
        orchestrator,
        adc,
        relays,
        ..
    } = workshop;
    let status = orchestrator.status_board();
    let signal = ShutdownSignal::new();
    let task = tokio::spawn(orchestrator.run(Duration::from_millis(100), signal.listener()));

    tokio::time::sleep(Duration::from_millis(250)).await;
    adc.set_signal(0, BURST);
    for _ in 0..WINDOW {
        adc.sample_once();
    }
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(status.get_state("main").unwrap().state, EntityState::SpinningUp);
    assert_eq!(relays.last_digital_write(0), Some(true));

    signal.trigger();
    task.await.unwrap().unwrap();
    assert_eq!(relays.last_digital_write(0), Some(false));
}
