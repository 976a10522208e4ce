//! Periodic collection of run stats from every agent into a log file.

use anyhow::{Context, Result};
use load_engine::StatsPrinter;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::Cluster;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Append tab-separated stats lines for `run_id` to `path` every `interval`
/// until no agent reports the run as running. Returns the number of polls.
///
/// An agent that can't be reached is logged and counted as stopped.
pub async fn follow_run(
    cluster: &Cluster,
    run_id: &str,
    path: &Path,
    interval: Duration,
) -> Result<u64> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut printer = StatsPrinter::new(BufWriter::new(file));

    let mut iteration = 0;
    loop {
        let mut running = 0;
        for (address, result) in cluster.stats(run_id).await {
            match result {
                Ok(stats) => {
                    printer.print_stats(iteration, Some(&address.to_string()), &stats.metrics)?;
                    if stats.info.is_running {
                        running += 1;
                    }
                }
                Err(e) => warn!(agent = %address, error = %e, "failed to fetch stats"),
            }
        }
        iteration += 1;
        debug!(run_id, iteration, running, "stats collected");
        if running == 0 {
            return Ok(iteration);
        }
        tokio::time::sleep(interval).await;
    }
}
