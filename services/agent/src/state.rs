//! Shared agent state.

use std::collections::BTreeMap;
use std::sync::Arc;

use agent_protocol::{RunInfo, RunRequest, RunStats};
use load_engine::{LoadGenerator, WorkloadRegistry};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::{broadcast, RwLock};

/// A run accepted by this agent, running or finished.
pub struct RunEntry {
    pub request: RunRequest,
    pub engine: Arc<LoadGenerator>,
}

impl RunEntry {
    pub fn info(&self) -> RunInfo {
        RunInfo::from_request(&self.request, self.engine.state())
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            info: self.info(),
            metrics: self.engine.snapshot(),
        }
    }
}

/// Application state shared across all handlers.
pub struct AgentState {
    pub registry: WorkloadRegistry,
    /// Runs by id. Kept for the lifetime of the process.
    pub runs: RwLock<BTreeMap<String, Arc<RunEntry>>>,
    pub prometheus: Option<PrometheusHandle>,
    pub shutdown: broadcast::Sender<()>,
}

impl AgentState {
    pub fn new(registry: WorkloadRegistry, prometheus: Option<PrometheusHandle>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            registry,
            runs: RwLock::new(BTreeMap::new()),
            prometheus,
            shutdown,
        }
    }

    pub async fn run(&self, run_id: &str) -> Option<Arc<RunEntry>> {
        self.runs.read().await.get(run_id).cloned()
    }

    /// Engines that are still running.
    pub async fn running(&self) -> Vec<Arc<RunEntry>> {
        self.runs
            .read()
            .await
            .values()
            .filter(|entry| entry.engine.is_running())
            .cloned()
            .collect()
    }
}
