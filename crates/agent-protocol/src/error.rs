//! Protocol error types.

use thiserror::Error;

/// Result type alias using ProtocolError.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid agent address '{0}': expected host:port")]
    InvalidAddress(String),

    #[error("invalid port in '{address}': {source}")]
    InvalidPort {
        address: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("invalid run request: {0}")]
    InvalidRequest(String),
}
