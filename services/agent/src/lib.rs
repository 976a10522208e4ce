//! Legion agent: hosts load engine runs behind an HTTP control plane.
//!
//! Runs are kept in memory for the lifetime of the process.

pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::{AgentError, AgentResult};
pub use state::{AgentState, RunEntry};

/// Create the agent router.
pub fn create_router(state: Arc<AgentState>) -> Router {
    Router::new()
        .route("/", get(handlers::version_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/exit", post(handlers::exit_handler))
        .route("/workloads", get(handlers::workloads_handler))
        .route(
            "/runs",
            get(handlers::list_runs_handler).post(handlers::start_run_handler),
        )
        .route("/runs/:id", get(handlers::run_stats_handler))
        .route("/runs/:id/interrupt", post(handlers::interrupt_run_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
