//! Agent API errors and their HTTP mapping.

use agent_protocol::{ErrorResponse, ProtocolError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use load_engine::{EngineError, WorkloadError};
use thiserror::Error;
use tracing::warn;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    InvalidRequest(#[from] ProtocolError),

    #[error("unknown workload: {0}")]
    UnknownWorkload(String),

    #[error("run {0} already exists")]
    DuplicateRun(String),

    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("run {0} is not running")]
    NotRunning(String),

    #[error("failed to build workload: {0}")]
    Workload(#[from] WorkloadError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("prometheus recorder not installed")]
    MetricsUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn status(&self) -> StatusCode {
        match self {
            AgentError::InvalidRequest(_)
            | AgentError::UnknownWorkload(_)
            | AgentError::DuplicateRun(_)
            | AgentError::Workload(_) => StatusCode::BAD_REQUEST,
            AgentError::RunNotFound(_) => StatusCode::NOT_FOUND,
            AgentError::NotRunning(_) => StatusCode::CONFLICT,
            AgentError::Engine(e) if e.is_lifecycle() => StatusCode::CONFLICT,
            AgentError::Engine(
                EngineError::InvalidConfig(_)
                | EngineError::NoLoaders
                | EngineError::LoaderInit { .. },
            ) => StatusCode::BAD_REQUEST,
            AgentError::MetricsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AgentError::Engine(_) | AgentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for AgentError {
    fn from(err: tokio::task::JoinError) -> Self {
        AgentError::Internal(err.to_string())
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AgentError::UnknownWorkload("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AgentError::RunNotFound("r".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AgentError::Engine(EngineError::NotRunning).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AgentError::Engine(EngineError::NoLoaders).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AgentError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
