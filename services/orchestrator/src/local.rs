//! In-process runs, without any agent.

use agent_protocol::RunRequest;
use anyhow::{Context, Result};
use load_engine::{LoadGenerator, MetricsReporter, MetricsSnapshot, WorkloadRegistry};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A workload running on the local engine.
pub struct LocalRun {
    request: RunRequest,
    engine: Arc<LoadGenerator>,
}

impl LocalRun {
    /// Build the requested workload from `registry` and start it.
    pub fn start(registry: &WorkloadRegistry, request: RunRequest) -> Result<Self> {
        request.validate()?;
        let factory = registry.get(&request.workload).with_context(|| {
            format!(
                "unknown workload '{}', available: {}",
                request.workload,
                registry.names().join(", ")
            )
        })?;
        let workload = factory
            .build(&request.properties)
            .with_context(|| format!("failed to build workload '{}'", request.workload))?;

        let engine = Arc::new(LoadGenerator::new(request.engine_config()));
        workload
            .start(&engine, request.properties.clone())
            .context("failed to start load generator")?;
        info!(run_id = %request.run_id, workload = %request.workload, "local run started");
        Ok(Self { request, engine })
    }

    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    pub fn engine(&self) -> &Arc<LoadGenerator> {
        &self.engine
    }

    /// Block until the run ends, writing a report to `out` every
    /// `report_every` while it is running.
    pub fn wait(
        &self,
        report_every: Option<Duration>,
        out: &mut impl Write,
    ) -> Result<MetricsSnapshot> {
        if let Some(every) = report_every {
            let mut next = Instant::now() + every;
            while self.engine.is_running() {
                thread::sleep(POLL_INTERVAL.min(every));
                if Instant::now() >= next {
                    out.write_all(MetricsReporter::format(&self.engine.snapshot()).as_bytes())?;
                    out.flush()?;
                    next += every;
                }
            }
        }
        self.engine.join()?;
        let stats = self.engine.snapshot();
        info!(
            run_id = %self.request.run_id,
            state = ?self.engine.state(),
            success = stats.success.count,
            exceptions = stats.exceptions.count,
            "local run finished"
        );
        Ok(stats)
    }
}
