//! Legion command line: local runs and control of remote agents.

use agent_protocol::AgentAddress;
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use legion_orchestrator::follow::{follow_run, DEFAULT_POLL_INTERVAL};
use legion_orchestrator::scenario::parse_properties;
use legion_orchestrator::{Cluster, LocalRun, Overrides, PerAgent, Scenario};
use load_engine::{MetricsSnapshot, ResultsTable, WorkloadRegistry};

#[derive(Parser)]
#[command(name = "legion")]
#[command(about = "Distributed load generation", long_about = None)]
struct Cli {
    /// Comma separated agent addresses (host[:port])
    #[arg(short, long, global = true, env = "LEGION_AGENTS", default_value = "localhost:8090")]
    agents: String,

    /// Log level
    #[arg(long, global = true, env = "LEGION_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workload in this process
    Local {
        #[command(flatten)]
        run: RunArgs,

        /// Print a metrics report every N seconds while running
        #[arg(long)]
        report_every: Option<u64>,

        /// Output format: table (default), json
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Print the version of every agent
    AgentsVersion,

    /// List the workloads of every agent
    Workloads,

    /// List the runs of every agent
    Runs,

    /// Start the same run on every agent
    TestRun {
        #[command(flatten)]
        run: RunArgs,

        /// Append tab-separated stats to this file until the run ends
        #[arg(long)]
        logs: Option<PathBuf>,

        /// Seconds between two stats polls
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
        poll_secs: u64,
    },

    /// Print the stats of a run on every agent
    Stats {
        run_id: String,

        /// Output format: table (default), json
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Interrupt a run on every agent
    Interrupt { run_id: String },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Workload to run
    #[arg(short, long, required_unless_present = "scenario", conflicts_with = "scenario")]
    workload: Option<String>,

    /// Path to scenario YAML file
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Override duration limit in seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Override total task limit
    #[arg(short = 'n', long)]
    queries: Option<u64>,

    /// Override tasks per second limit
    #[arg(short = 'r', long)]
    qps: Option<f64>,

    /// Override the maximum number of generator threads
    #[arg(short = 't', long)]
    generator_threads: Option<usize>,

    /// Workload property (repeatable)
    #[arg(short = 'p', long = "property", value_name = "KEY=VALUE")]
    properties: Vec<String>,
}

impl RunArgs {
    fn scenario(&self) -> Result<Scenario> {
        let mut scenario = match (&self.scenario, &self.workload) {
            (Some(path), _) => Scenario::from_file(path)?,
            (None, Some(workload)) => Scenario::for_workload(workload.as_str()),
            (None, None) => bail!("either --workload or --scenario is required"),
        };
        scenario.apply(&Overrides {
            duration_secs: self.duration,
            max_tasks: self.queries,
            max_rate: self.qps,
            generator_threads: self.generator_threads,
            properties: parse_properties(&self.properties)?,
        });
        scenario.validate()?;
        Ok(scenario)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Local {
            run,
            report_every,
            output,
        } => {
            let scenario = run.scenario()?;
            println!("Running {} locally", scenario.name);
            let request = scenario.to_run_request()?;
            let registry = WorkloadRegistry::with_builtins();
            let local = Arc::new(LocalRun::start(&registry, request)?);

            let interrupter = Arc::clone(local.engine());
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received interrupt, stopping run");
                    tokio::task::spawn_blocking(move || interrupter.interrupt().ok())
                        .await
                        .ok();
                }
            });

            let waiter = Arc::clone(&local);
            let report_every = report_every.map(Duration::from_secs);
            let stats =
                tokio::task::spawn_blocking(move || waiter.wait(report_every, &mut std::io::stderr()))
                    .await??;
            print_snapshot(&scenario.name, &stats, &output)
        }
        Commands::AgentsVersion => {
            let cluster = cluster(&cli.agents)?;
            report(cluster.versions().await, |version| println!("  {version}"))
        }
        Commands::Workloads => {
            let cluster = cluster(&cli.agents)?;
            report(cluster.workloads().await, |list| {
                for workload in &list.workloads {
                    println!("  {} - {}", workload.name, workload.description);
                }
            })
        }
        Commands::Runs => {
            let cluster = cluster(&cli.agents)?;
            report(cluster.runs().await, |list| {
                if list.runs.is_empty() {
                    println!("  no runs");
                }
                for run in &list.runs {
                    println!("  {}  {}  {:?}", run.run_id, run.workload, run.state);
                }
            })
        }
        Commands::TestRun {
            run,
            logs,
            poll_secs,
        } => {
            let cluster = cluster(&cli.agents)?;
            let request = run.scenario()?.to_run_request()?;
            cluster.start_run(&request).await?;
            println!("{}", request.run_id);

            if let Some(path) = logs {
                let interval = Duration::from_secs(poll_secs.max(1));
                let polls = follow_run(&cluster, &request.run_id, &path, interval).await?;
                info!(polls, path = %path.display(), "run ended on every agent");
            }
            Ok(())
        }
        Commands::Stats { run_id, output } => {
            let cluster = cluster(&cli.agents)?;
            let results = cluster.stats(&run_id).await;
            report(results, |stats| {
                let title = format!("{} ({:?})", run_id, stats.info.state);
                if let Err(e) = print_snapshot(&title, &stats.metrics, &output) {
                    eprintln!("  {e:#}");
                }
            })
        }
        Commands::Interrupt { run_id } => {
            let cluster = cluster(&cli.agents)?;
            report(cluster.interrupt(&run_id).await, |stats| {
                println!(
                    "  interrupted after {} tasks",
                    stats.metrics.total_tasks()
                );
            })
        }
    }
}

fn cluster(agents: &str) -> Result<Cluster> {
    Cluster::new(AgentAddress::parse_list(agents)?)
}

fn print_snapshot(title: &str, stats: &MetricsSnapshot, output: &str) -> Result<()> {
    match output {
        "json" => println!("{}", ResultsTable::format_json(stats)?),
        _ => println!("{}", ResultsTable::format_table(title, stats)),
    }
    Ok(())
}

/// Print every successful result under its agent, and fail if any agent failed.
fn report<T>(results: PerAgent<T>, mut show: impl FnMut(&T)) -> Result<()> {
    let mut failed = 0;
    for (address, result) in results {
        match result {
            Ok(value) => {
                println!("{address}:");
                show(&value);
            }
            Err(e) => {
                eprintln!("{address}: {e:#}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} agent(s) failed");
    }
    Ok(())
}
