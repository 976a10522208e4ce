//! Error types for the load engine.

use std::error::Error as StdError;
use thiserror::Error;

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type returned by workload callbacks.
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Lifecycle and setup errors of a load generator.
///
/// These are caller contract violations or setup failures, never the outcome
/// of a single task: generator and loader faults during a run are absorbed by
/// the workers and surface only in the metrics.
#[derive(Debug, Error)]
pub enum EngineError {
    // === Lifecycle Errors ===
    #[error("load generator can't be started twice")]
    AlreadyStarted,

    #[error("load generator has not been started")]
    NotStarted,

    #[error("load generator is not running")]
    NotRunning,

    // === Setup Errors ===
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("at least one loader is required")]
    NoLoaders,

    #[error("failed to initialize loader {index}: {source}")]
    LoaderInit {
        index: usize,
        #[source]
        source: WorkloadError,
    },

    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error reports misuse of the start/join/interrupt lifecycle.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EngineError::AlreadyStarted | EngineError::NotStarted | EngineError::NotRunning
        )
    }
}

/// Failure reported by a user-supplied generator or loader.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct WorkloadError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl WorkloadError {
    /// Create an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap any error, using its display text as the message.
    pub fn from_error(source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for WorkloadError {
    fn from(err: std::io::Error) -> Self {
        WorkloadError::from_error(err)
    }
}

impl From<String> for WorkloadError {
    fn from(message: String) -> Self {
        WorkloadError::new(message)
    }
}

impl From<&str> for WorkloadError {
    fn from(message: &str) -> Self {
        WorkloadError::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_classification() {
        assert!(EngineError::AlreadyStarted.is_lifecycle());
        assert!(EngineError::NotStarted.is_lifecycle());
        assert!(EngineError::NotRunning.is_lifecycle());
        assert!(!EngineError::NoLoaders.is_lifecycle());
    }

    #[test]
    fn test_workload_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = WorkloadError::with_source("request failed", io);
        assert_eq!(err.to_string(), "request failed");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_loader_init_message() {
        let err = EngineError::LoaderInit {
            index: 3,
            source: WorkloadError::new("no target host"),
        };
        assert_eq!(err.to_string(), "failed to initialize loader 3: no target host");
    }
}
