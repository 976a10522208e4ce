//! HTTP handlers of the agent control plane.

use std::sync::Arc;

use agent_protocol::{
    RunInfo, RunRequest, RunStats, RunsList, WorkloadInfo, WorkloadsList, AGENT_VERSION,
};
use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use load_engine::{LoadGenerator, WorkloadFactory};
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};
use crate::state::{AgentState, RunEntry};

// ============================================================================
// Service
// ============================================================================

/// GET / - Agent version
pub async fn version_handler() -> &'static str {
    AGENT_VERSION
}

/// GET /health
pub async fn health_handler() -> &'static str {
    "ok"
}

/// GET /metrics - Prometheus exposition of the engine metrics
pub async fn metrics_handler(Extension(state): Extension<Arc<AgentState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => AgentError::MetricsUnavailable.into_response(),
    }
}

/// POST /exit - Stop accepting requests and interrupt running runs
pub async fn exit_handler(Extension(state): Extension<Arc<AgentState>>) -> StatusCode {
    info!("exit requested");
    // No receiver only means the server is already shutting down.
    state.shutdown.send(()).ok();
    StatusCode::ACCEPTED
}

// ============================================================================
// Workloads
// ============================================================================

/// GET /workloads
pub async fn workloads_handler(
    Extension(state): Extension<Arc<AgentState>>,
) -> Json<WorkloadsList> {
    let workloads = state
        .registry
        .iter()
        .map(|factory| WorkloadInfo {
            name: factory.name().to_string(),
            description: factory.description().to_string(),
        })
        .collect();
    Json(WorkloadsList { workloads })
}

// ============================================================================
// Runs
// ============================================================================

/// GET /runs
pub async fn list_runs_handler(Extension(state): Extension<Arc<AgentState>>) -> Json<RunsList> {
    let runs = state.runs.read().await.values().map(|entry| entry.info()).collect();
    Json(RunsList { runs })
}

/// POST /runs - Build the named workload and start it
pub async fn start_run_handler(
    Extension(state): Extension<Arc<AgentState>>,
    Json(request): Json<RunRequest>,
) -> AgentResult<(StatusCode, Json<RunInfo>)> {
    request.validate()?;
    let factory = state
        .registry
        .get(&request.workload)
        .ok_or_else(|| AgentError::UnknownWorkload(request.workload.clone()))?;

    // Registered before it starts, so the id is taken and the engine is
    // reachable by every route whatever happens to this request.
    let entry = Arc::new(RunEntry {
        engine: Arc::new(LoadGenerator::new(request.engine_config())),
        request,
    });
    {
        let mut runs = state.runs.write().await;
        if runs.contains_key(&entry.request.run_id) {
            return Err(AgentError::DuplicateRun(entry.request.run_id.clone()));
        }
        runs.insert(entry.request.run_id.clone(), Arc::clone(&entry));
    }

    // A spawned task is not cancelled if the client goes away.
    tokio::spawn(start_run(state, Arc::clone(&entry), factory)).await??;
    Ok((StatusCode::CREATED, Json(entry.info())))
}

/// Build and start a registered run, dropping it from the registry if that
/// fails.
async fn start_run(
    state: Arc<AgentState>,
    entry: Arc<RunEntry>,
    factory: Arc<dyn WorkloadFactory>,
) -> AgentResult<()> {
    let props = entry.request.properties.clone();
    let engine = Arc::clone(&entry.engine);
    // Loader init may block, keep it off the async workers.
    let started = tokio::task::spawn_blocking(move || -> AgentResult<()> {
        let workload = factory.build(&props)?;
        workload.start(&engine, props)?;
        Ok(())
    })
    .await
    .map_err(AgentError::from)
    .and_then(|result| result);

    if let Err(e) = started {
        warn!(run_id = %entry.request.run_id, error = %e, "run failed to start");
        state.runs.write().await.remove(&entry.request.run_id);
        return Err(e);
    }

    info!(
        run_id = %entry.request.run_id,
        workload = %entry.request.workload,
        duration_limit = entry.request.duration_limit,
        queries_limit = entry.request.queries_limit,
        qps_limit = entry.request.qps_limit,
        "run started"
    );
    watch_completion(entry);
    Ok(())
}

/// Log the outcome of a run once its workers have exited.
fn watch_completion(entry: Arc<RunEntry>) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = entry.engine.join() {
            warn!(run_id = %entry.request.run_id, error = %e, "failed to join run");
            return;
        }
        let stats = entry.engine.snapshot();
        info!(
            run_id = %entry.request.run_id,
            state = ?entry.engine.state(),
            success = stats.success.count,
            exceptions = stats.exceptions.count,
            duration_ms = stats.duration,
            "run finished"
        );
    });
}

/// GET /runs/:id
pub async fn run_stats_handler(
    Extension(state): Extension<Arc<AgentState>>,
    Path(run_id): Path<String>,
) -> AgentResult<Json<RunStats>> {
    let entry = state
        .run(&run_id)
        .await
        .ok_or_else(|| AgentError::RunNotFound(run_id.clone()))?;
    Ok(Json(entry.stats()))
}

/// POST /runs/:id/interrupt - Stop the run and wait for its loaders
pub async fn interrupt_run_handler(
    Extension(state): Extension<Arc<AgentState>>,
    Path(run_id): Path<String>,
) -> AgentResult<Json<RunStats>> {
    let entry = state
        .run(&run_id)
        .await
        .ok_or_else(|| AgentError::RunNotFound(run_id.clone()))?;
    if !entry.engine.is_running() {
        return Err(AgentError::NotRunning(run_id));
    }

    let engine = Arc::clone(&entry.engine);
    tokio::task::spawn_blocking(move || {
        engine.interrupt()?;
        engine.join()
    })
    .await??;

    info!(run_id = %run_id, "run interrupted");
    Ok(Json(entry.stats()))
}

/// Interrupt every running run, used on shutdown.
pub async fn interrupt_all(state: &AgentState) {
    for entry in state.running().await {
        let engine = Arc::clone(&entry.engine);
        let run_id = entry.request.run_id.clone();
        let result = tokio::task::spawn_blocking(move || engine.interrupt()).await;
        match result {
            Ok(Ok(())) => info!(run_id = %run_id, "run interrupted on shutdown"),
            Ok(Err(e)) => warn!(run_id = %run_id, error = %e, "failed to interrupt run"),
            Err(e) => warn!(run_id = %run_id, error = %e, "interrupt task failed"),
        }
    }
}
