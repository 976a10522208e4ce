//! Run and workload messages.

use load_engine::{EngineConfig, MetricsSnapshot, Properties, RunState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProtocolError, ProtocolResult};

fn unlimited() -> i64 {
    -1
}

fn unlimited_rate() -> f64 {
    -1.0
}

fn default_generator_threads() -> usize {
    load_engine::config::DEFAULT_GENERATOR_THREADS
}

/// Body of `POST /runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub run_id: String,
    pub workload: String,
    /// Seconds; `<= 0` for no limit.
    #[serde(default = "unlimited")]
    pub duration_limit: i64,
    #[serde(default = "unlimited")]
    pub queries_limit: i64,
    #[serde(default = "unlimited_rate")]
    pub qps_limit: f64,
    #[serde(default = "default_generator_threads")]
    pub generator_threads_limit: usize,
    #[serde(default)]
    pub properties: Properties,
}

impl RunRequest {
    /// Request with a fresh random run id and no limits.
    pub fn new(workload: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            workload: workload.into(),
            duration_limit: unlimited(),
            queries_limit: unlimited(),
            qps_limit: unlimited_rate(),
            generator_threads_limit: default_generator_threads(),
            properties: Properties::new(),
        }
    }

    pub fn validate(&self) -> ProtocolResult<()> {
        if self.run_id.trim().is_empty() {
            return Err(ProtocolError::InvalidRequest("runId must not be empty".into()));
        }
        if self.workload.trim().is_empty() {
            return Err(ProtocolError::InvalidRequest("workload must not be empty".into()));
        }
        if self.generator_threads_limit == 0 {
            return Err(ProtocolError::InvalidRequest(
                "generatorThreadsLimit must be > 0".into(),
            ));
        }
        if self.qps_limit.is_nan() {
            return Err(ProtocolError::InvalidRequest("qpsLimit must be a number".into()));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::with_limits(self.duration_limit, self.queries_limit, self.qps_limit)
            .generator_threads(self.generator_threads_limit)
    }
}

/// Summary of a run known to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub run_id: String,
    pub workload: String,
    pub is_running: bool,
    pub state: RunState,
    pub duration_limit: i64,
    pub queries_limit: i64,
    pub qps_limit: f64,
    pub generator_threads_limit: usize,
}

impl RunInfo {
    pub fn from_request(request: &RunRequest, state: RunState) -> Self {
        Self {
            run_id: request.run_id.clone(),
            workload: request.workload.clone(),
            is_running: state == RunState::Running,
            state,
            duration_limit: request.duration_limit,
            queries_limit: request.queries_limit,
            qps_limit: request.qps_limit,
            generator_threads_limit: request.generator_threads_limit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunsList {
    pub runs: Vec<RunInfo>,
}

/// Run summary plus its metrics, as one flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(flatten)]
    pub info: RunInfo,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadsList {
    pub workloads: Vec<WorkloadInfo>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
