//! geopresence agent
//!
//! - Presence frames: newline-delimited JSON on stdin
//! - Position sensor: replay file from config, or unavailable
//! - Persistence: POST {backend.api_base_url}/update-location
//! - Ops HTTP: /healthz /readyz /metrics /v1/markers /v1/roster

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use geopresence_agent::{
    app_state::AgentState,
    config,
    notify::TracingNotifier,
    obs::AgentMetrics,
    publisher::HttpSink,
    router, sensor,
    session::Session,
    surface::WatchSurface,
    transport::LineTransport,
};
use geopresence_core::error::{GeoPresenceError, Result};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.code().as_str(), "geopresence-agent failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("GEOPRESENCE_CONFIG").unwrap_or_else(|_| "geopresence.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .ops
        .listen
        .parse()
        .map_err(|e| GeoPresenceError::Config(format!("ops.listen must be a valid SocketAddr: {e}")))?;

    let metrics = Arc::new(AgentMetrics::default());
    let (surface, snapshot) = WatchSurface::new();

    let state = AgentState::new(cfg.clone(), Arc::clone(&metrics), snapshot);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| GeoPresenceError::Internal(format!("failed to bind {listen}: {e}")))?;
    tracing::info!(%listen, "ops endpoint starting");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router::build_router(state)).await {
            tracing::error!(error = %e, "ops server failed");
        }
    });

    let sink = Arc::new(HttpSink::new(&cfg.backend)?);
    let source = sensor::from_config(&cfg.sensor)?;
    let mut transport = LineTransport::new(tokio::io::stdin());

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let drain_metrics = Arc::clone(&metrics);
    tokio::spawn(async move {
        shutdown_signal().await;
        drain_metrics.set_draining();
        let _ = shutdown_tx.send(true);
    });

    tracing::info!(
        app_key = %cfg.transport.app_key,
        cluster = %cfg.transport.cluster,
        auth_endpoint = %cfg.transport.auth_endpoint,
        channel = %cfg.transport.channel,
        "geopresence-agent starting"
    );

    let mut session = Session::new(
        &cfg,
        Box::new(surface),
        Box::new(TracingNotifier),
        sink,
        metrics,
    );
    session
        .run_connection(&mut transport, source, &mut shutdown_rx)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, ending connection");
}
