//! Run scenarios loaded from YAML, with command line overrides.
//!
//! ```yaml
//! name: smoke
//! description: Ten seconds of sleeping loaders at 200 qps
//! workload: sleep
//! duration_secs: 10
//! max_rate: 200
//! properties:
//!   loaders: 8
//!   loadMs: 5
//! ```

use agent_protocol::RunRequest;
use anyhow::{bail, Context, Result};
use load_engine::config::DEFAULT_GENERATOR_THREADS;
use load_engine::Properties;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// A named workload run with its limits and properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub workload: String,
    #[serde(default)]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub max_tasks: Option<u64>,
    #[serde(default)]
    pub max_rate: Option<f64>,
    #[serde(default = "default_generator_threads")]
    pub generator_threads: usize,
    /// Scalar values only; numbers and booleans are passed on as text.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

fn default_generator_threads() -> usize {
    DEFAULT_GENERATOR_THREADS
}

/// Values given on the command line, applied over a scenario.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub duration_secs: Option<u64>,
    pub max_tasks: Option<u64>,
    pub max_rate: Option<f64>,
    pub generator_threads: Option<usize>,
    pub properties: Vec<(String, String)>,
}

impl Scenario {
    /// Scenario running `workload` without limits.
    pub fn for_workload(workload: impl Into<String>) -> Self {
        let workload = workload.into();
        Self {
            name: workload.clone(),
            description: String::new(),
            workload,
            duration_secs: None,
            max_tasks: None,
            max_rate: None,
            generator_threads: default_generator_threads(),
            properties: BTreeMap::new(),
        }
    }

    /// Load a scenario from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(d) = overrides.duration_secs {
            self.duration_secs = Some(d);
        }
        if let Some(n) = overrides.max_tasks {
            self.max_tasks = Some(n);
        }
        if let Some(r) = overrides.max_rate {
            self.max_rate = Some(r);
        }
        if let Some(t) = overrides.generator_threads {
            self.generator_threads = t;
        }
        for (key, value) in &overrides.properties {
            self.properties.insert(key.clone(), Value::String(value.clone()));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workload.trim().is_empty() {
            bail!("workload must be specified");
        }
        if self.generator_threads == 0 {
            bail!("generator_threads must be > 0");
        }
        if let Some(rate) = self.max_rate {
            if !rate.is_finite() || rate <= 0.0 {
                bail!("max_rate must be a positive number");
            }
        }
        self.properties()?;
        Ok(())
    }

    /// Properties as the flat string map handed to workloads.
    pub fn properties(&self) -> Result<Properties> {
        let mut props = Properties::new();
        for (key, value) in &self.properties {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => bail!("property {key} must be a string, number or boolean"),
            };
            props.set(key.as_str(), text);
        }
        Ok(props)
    }

    /// Agent request for this scenario, under a fresh run id.
    pub fn to_run_request(&self) -> Result<RunRequest> {
        let mut request = RunRequest::new(self.workload.clone());
        request.duration_limit = limit(self.duration_secs);
        request.queries_limit = limit(self.max_tasks);
        request.qps_limit = self.max_rate.unwrap_or(-1.0);
        request.generator_threads_limit = self.generator_threads;
        request.properties = self.properties()?;
        Ok(request)
    }
}

fn limit(value: Option<u64>) -> i64 {
    value.map_or(-1, |v| i64::try_from(v).unwrap_or(i64::MAX))
}

/// Parse `key=value` command line properties.
pub fn parse_properties(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            Properties::parse_pair(pair)
                .with_context(|| format!("invalid property '{pair}', expected key=value"))
        })
        .collect()
}
