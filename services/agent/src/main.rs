//! Legion agent service.

use anyhow::{Context, Result};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use legion_agent::{create_router, handlers, AgentState};
use load_engine::WorkloadRegistry;

#[derive(Parser, Debug)]
#[command(name = "legion-agent")]
#[command(about = "Legion load generation agent")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LEGION_AGENT_LISTEN", default_value = "0.0.0.0:8090")]
    listen: String,

    /// Log level
    #[arg(long, env = "LEGION_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let registry = WorkloadRegistry::with_builtins();
    info!(workloads = ?registry.names(), "Starting legion agent");

    let state = Arc::new(AgentState::new(registry, Some(prometheus_handle)));
    let app = create_router(Arc::clone(&state));

    // Ctrl-C and POST /exit both end up on the shutdown channel
    let shutdown_tx = state.shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(()).ok();
    });
    let mut shutdown_rx = state.shutdown.subscribe();

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("invalid listen address: {}", args.listen))?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
        })
        .await?;

    handlers::interrupt_all(&state).await;
    info!("Agent stopped");
    Ok(())
}
