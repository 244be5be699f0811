//! # dusthubd — dusthub daemon
//!
//! Composition root that wires boards, the control loop and the HTTP adapter
//! together and runs them until asked to stop.
//!
//! ## Responsibilities
//! - Load configuration (`dusthub.toml`, env vars) and initialise tracing
//! - Construct one simulated board per `[[boards]]` entry and register it
//! - Assemble the orchestrator from the topology
//! - Spawn the sampling loops, the control loop and the HTTP server
//! - Handle graceful shutdown (SIGTERM/SIGINT): stop every loop, drive
//!   outputs to a safe state, abort tasks that do not stop in time
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use dusthub_adapter_http_axum::state::AppState;
use dusthub_adapter_virtual::VirtualBoard;
use dusthub_app::builder::OrchestratorBuilder;
use dusthub_app::event_bus::InProcessEventBus;
use dusthub_app::ports::{Board as _, BoardHandle, BoardRegistry};
use dusthub_app::shutdown::{ShutdownSignal, join_with_timeout};
use dusthub_domain::topology::Capability;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    init_tracing(&config.logging.filter);

    // Boards
    let mut registry = BoardRegistry::new();
    let mut analog_boards = Vec::new();
    for definition in &config.topology.boards {
        let board = Arc::new(VirtualBoard::from_definition(definition));
        tracing::info!(
            board = %definition.id,
            kind = ?definition.kind,
            "simulated board registered"
        );
        if definition.capabilities().contains(&Capability::AnalogIn) {
            analog_boards.push(Arc::clone(&board));
        }
        registry.register(board as BoardHandle);
    }

    // Control loop
    let event_bus = Arc::new(InProcessEventBus::new(config.control.event_capacity));
    let orchestrator = OrchestratorBuilder::new(&config.topology, &registry)
        .sensor_defaults(config.sensor_defaults.clone())
        .gate_settle(config.control.gate_settle())
        .identify(config.control.identify())
        .command_capacity(config.control.command_capacity)
        .build(Arc::clone(&event_bus), Instant::now())
        .context("assembling the control loop")?;
    let state = AppState::new(
        orchestrator.status_board(),
        orchestrator.control_handle(),
        Arc::clone(&event_bus),
    );

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;

    let shutdown = ShutdownSignal::new();
    let samplers: Vec<(String, JoinHandle<()>)> = analog_boards
        .into_iter()
        .map(|board| {
            let name = format!("sampler {}", board.id());
            (name, dusthub_adapter_virtual::spawn_sampler(board, shutdown.listener()))
        })
        .collect();
    let mut control = tokio::spawn(
        orchestrator.run(config.control.tick_interval(), shutdown.listener()),
    );

    // HTTP
    let app = dusthub_adapter_http_axum::router::build(state);
    tracing::info!(address = %bind_addr, "dusthubd listening");
    let mut http_shutdown = shutdown.listener();
    let http = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_shutdown.wait().await })
            .await
    });

    let finished_early = tokio::select! {
        () = shutdown_requested() => {
            tracing::info!("shutdown requested");
            None
        }
        joined = &mut control => Some(joined),
    };
    shutdown.trigger();

    let timeout = config.control.shutdown_timeout();
    let control_result = match finished_early {
        Some(joined) => joined.ok(),
        None => join_with_timeout("control loop", control, timeout).await,
    };
    if let Some(Err(err)) = join_with_timeout("http server", http, timeout).await {
        tracing::error!(%err, "http server failed");
    }
    for (name, handle) in samplers {
        join_with_timeout(&name, handle, timeout).await;
    }

    match control_result {
        Some(result) => result.context("control loop failed")?,
        None => tracing::warn!("control loop did not report its outcome"),
    }
    tracing::info!("dusthubd stopped");
    Ok(())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?} ({err}), falling back to info");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_requested() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
