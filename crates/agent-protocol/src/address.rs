//! Agent addresses as given on the command line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, ProtocolResult};
use crate::DEFAULT_AGENT_PORT;

/// `host:port` of an agent. The port defaults to 8090 when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentAddress {
    pub host: String,
    pub port: u16,
}

impl AgentAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the agent API.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// Parse a comma separated list, ignoring empty entries.
    pub fn parse_list(list: &str) -> ProtocolResult<Vec<AgentAddress>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for AgentAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("http://").unwrap_or(s).trim_end_matches('/');
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|source| ProtocolError::InvalidPort {
                    address: s.to_string(),
                    source,
                })?;
                (host, port)
            }
            None => (s, DEFAULT_AGENT_PORT),
        };
        if host.is_empty() || host.contains('/') {
            return Err(ProtocolError::InvalidAddress(s.to_string()));
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
