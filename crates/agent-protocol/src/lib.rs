//! JSON wire types of the agent HTTP API.
//!
//! All bodies use camelCase field names. Metric snapshots reuse the
//! serializable stats types of `load-engine`.

pub mod address;
pub mod error;
pub mod runs;

pub use address::AgentAddress;
pub use error::{ProtocolError, ProtocolResult};
pub use runs::{
    ErrorResponse, RunInfo, RunRequest, RunStats, RunsList, WorkloadInfo, WorkloadsList,
};

/// Version string reported by `GET /`.
pub const AGENT_VERSION: &str = concat!("legion-agent ", env!("CARGO_PKG_VERSION"));

/// Default agent port.
pub const DEFAULT_AGENT_PORT: u16 = 8090;
