//! Orchestration of legion runs: in-process, or across a set of agents.

pub mod client;
pub mod follow;
pub mod local;
pub mod scenario;

pub use client::{AgentClient, Cluster, PerAgent};
pub use local::LocalRun;
pub use scenario::{Overrides, Scenario};
