//! HTTP client for one agent, and fan-out across a set of agents.

use agent_protocol::{
    AgentAddress, ErrorResponse, RunInfo, RunRequest, RunStats, RunsList, WorkloadsList,
};
use anyhow::{bail, Context, Result};
use futures::future::join_all;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Properties added to every run started through a [`Cluster`].
pub const AGENTS_PROPERTY: &str = "agents";
pub const AGENT_INDEX_PROPERTY: &str = "agentIndex";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Client for the control plane of a single agent.
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    address: AgentAddress,
}

impl AgentClient {
    pub fn new(address: AgentAddress) -> Result<Self> {
        Ok(Self::with_client(http_client()?, address))
    }

    pub fn with_client(client: Client, address: AgentAddress) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    pub async fn version(&self) -> Result<String> {
        let response = self.send(self.client.get(self.address.url("/"))).await?;
        Ok(response.text().await?)
    }

    pub async fn workloads(&self) -> Result<WorkloadsList> {
        self.get_json("/workloads").await
    }

    pub async fn runs(&self) -> Result<RunsList> {
        self.get_json("/runs").await
    }

    pub async fn start_run(&self, request: &RunRequest) -> Result<RunInfo> {
        let builder = self.client.post(self.address.url("/runs")).json(request);
        Ok(self.send(builder).await?.json().await?)
    }

    pub async fn stats(&self, run_id: &str) -> Result<RunStats> {
        self.get_json(&format!("/runs/{run_id}")).await
    }

    pub async fn interrupt(&self, run_id: &str) -> Result<RunStats> {
        let url = self.address.url(&format!("/runs/{run_id}/interrupt"));
        Ok(self.send(self.client.post(url)).await?.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.get(self.address.url(path))).await?;
        Ok(response.json().await?)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("{}: request failed", self.address))?;
        let status = response.status();
        debug!(agent = %self.address, status = %status, url = %response.url(), "agent response");
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        bail!("{}: {} {}", self.address, status.as_u16(), message)
    }
}

/// Result of one call, per agent, in agent order.
pub type PerAgent<T> = Vec<(AgentAddress, Result<T>)>;

/// The agents a command is run against.
#[derive(Debug, Clone)]
pub struct Cluster {
    agents: Vec<AgentClient>,
}

impl Cluster {
    pub fn new(addresses: Vec<AgentAddress>) -> Result<Self> {
        if addresses.is_empty() {
            bail!("at least one agent is required");
        }
        let client = http_client()?;
        let agents = addresses
            .into_iter()
            .map(|address| AgentClient::with_client(client.clone(), address))
            .collect();
        Ok(Self { agents })
    }

    pub fn agents(&self) -> &[AgentClient] {
        &self.agents
    }

    /// Comma separated `host:port` list of every agent.
    pub fn addresses(&self) -> String {
        self.agents
            .iter()
            .map(|a| a.address().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub async fn versions(&self) -> PerAgent<String> {
        self.zip(join_all(self.agents.iter().map(|a| a.version())).await)
    }

    pub async fn workloads(&self) -> PerAgent<WorkloadsList> {
        self.zip(join_all(self.agents.iter().map(|a| a.workloads())).await)
    }

    pub async fn runs(&self) -> PerAgent<RunsList> {
        self.zip(join_all(self.agents.iter().map(|a| a.runs())).await)
    }

    pub async fn stats(&self, run_id: &str) -> PerAgent<RunStats> {
        self.zip(join_all(self.agents.iter().map(|a| a.stats(run_id))).await)
    }

    pub async fn interrupt(&self, run_id: &str) -> PerAgent<RunStats> {
        self.zip(join_all(self.agents.iter().map(|a| a.interrupt(run_id))).await)
    }

    /// Start the same run on every agent.
    ///
    /// Each agent receives the full agent list and its own position in it.
    /// If any agent refuses the run, it is interrupted on the agents that
    /// accepted it and the first error is returned.
    pub async fn start_run(&self, request: &RunRequest) -> Result<Vec<RunInfo>> {
        let addresses = self.addresses();
        let requests: Vec<RunRequest> = (0..self.agents.len())
            .map(|index| {
                let mut request = request.clone();
                request.properties.set(AGENTS_PROPERTY, &addresses);
                request.properties.set(AGENT_INDEX_PROPERTY, index);
                request
            })
            .collect();
        let results = join_all(
            self.agents
                .iter()
                .zip(&requests)
                .map(|(agent, request)| agent.start_run(request)),
        )
        .await;

        if results.iter().all(Result::is_ok) {
            return results.into_iter().collect();
        }

        let started: Vec<&AgentClient> = self
            .agents
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_ok())
            .map(|(agent, _)| agent)
            .collect();
        for agent in started {
            if let Err(e) = agent.interrupt(&request.run_id).await {
                warn!(agent = %agent.address(), error = %e, "failed to roll back run");
            }
        }
        match results.into_iter().find_map(Result::err) {
            Some(e) => Err(e.context("failed to start run on every agent")),
            None => bail!("failed to start run on every agent"),
        }
    }

    fn zip<T>(&self, results: Vec<Result<T>>) -> PerAgent<T> {
        self.agents
            .iter()
            .map(|a| a.address().clone())
            .zip(results)
            .collect()
    }
}
