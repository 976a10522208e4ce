//! Orchestrator client against real agents served on local ports.

use std::sync::Arc;
use std::time::Duration;

use agent_protocol::{AgentAddress, RunRequest};
use legion_agent::{create_router, AgentState};
use legion_orchestrator::follow::follow_run;
use legion_orchestrator::{AgentClient, Cluster};
use load_engine::builtin::LOAD_MS;
use load_engine::{RunState, WorkloadRegistry};
use test_utils::temp_file_with;

async fn spawn_agent() -> AgentAddress {
    let state = Arc::new(AgentState::new(WorkloadRegistry::with_builtins(), None));
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    AgentAddress::new("127.0.0.1", port)
}

async fn spawn_cluster(agents: usize) -> Cluster {
    let mut addresses = Vec::new();
    for _ in 0..agents {
        addresses.push(spawn_agent().await);
    }
    Cluster::new(addresses).unwrap()
}

async fn wait_stopped(cluster: &Cluster, run_id: &str) {
    for _ in 0..100 {
        let results = cluster.stats(run_id).await;
        if results
            .iter()
            .all(|(_, r)| r.as_ref().map_or(false, |s| !s.info.is_running))
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("run {run_id} still running");
}

fn sleep_request(load_ms: u64) -> RunRequest {
    let mut request = RunRequest::new("sleep");
    request.properties.set(LOAD_MS, load_ms);
    request
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_versions_from_every_agent() {
    let cluster = spawn_cluster(2).await;
    let versions = cluster.versions().await;
    assert_eq!(versions.len(), 2);
    for (_, version) in versions {
        assert!(version.unwrap().starts_with("legion-agent "));
    }

    for (_, list) in cluster.workloads().await {
        assert_eq!(list.unwrap().workloads.len(), 3);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_agent_reported() {
    let cluster = Cluster::new(vec![AgentAddress::new("127.0.0.1", 1)]).unwrap();
    let versions = cluster.versions().await;
    assert!(versions[0].1.is_err());
}

// ============================================================================
// Distributed runs
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_on_every_agent() {
    let cluster = spawn_cluster(2).await;
    let mut request = RunRequest::new("noop");
    request.queries_limit = 30;

    let infos = cluster.start_run(&request).await.unwrap();
    assert_eq!(infos.len(), 2);
    assert!(infos.iter().all(|info| info.run_id == request.run_id));

    wait_stopped(&cluster, &request.run_id).await;
    for (_, stats) in cluster.stats(&request.run_id).await {
        let stats = stats.unwrap();
        assert_eq!(stats.info.state, RunState::Completed);
        assert_eq!(stats.metrics.success.count, 30);
    }

    for (_, runs) in cluster.runs().await {
        assert_eq!(runs.unwrap().runs.len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_workload_fails_start() {
    let cluster = spawn_cluster(1).await;
    let err = cluster
        .start_run(&RunRequest::new("missing"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("unknown workload"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_partial_start_rolled_back() {
    let first = spawn_agent().await;
    let second = spawn_agent().await;
    let request = sleep_request(5);

    // The second agent already runs this id and refuses it.
    let direct = AgentClient::new(second.clone()).unwrap();
    direct.start_run(&request).await.unwrap();

    let cluster = Cluster::new(vec![first.clone(), second]).unwrap();
    assert!(cluster.start_run(&request).await.is_err());

    let first = AgentClient::new(first).unwrap();
    let stats = first.stats(&request.run_id).await.unwrap();
    assert_eq!(stats.info.state, RunState::Interrupted);

    let stats = direct.interrupt(&request.run_id).await.unwrap();
    assert_eq!(stats.info.state, RunState::Interrupted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_every_agent() {
    let cluster = spawn_cluster(2).await;
    let request = sleep_request(5);
    cluster.start_run(&request).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    for (_, stats) in cluster.interrupt(&request.run_id).await {
        let stats = stats.unwrap();
        assert_eq!(stats.info.state, RunState::Interrupted);
        assert!(stats.metrics.success.count > 0);
    }

    for (_, result) in cluster.interrupt(&request.run_id).await {
        let err = result.unwrap_err();
        assert!(err.to_string().contains("409"));
    }
}

// ============================================================================
// Stats log
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_follow_run_until_done() {
    let cluster = spawn_cluster(2).await;
    let mut request = sleep_request(5);
    request.duration_limit = 1;
    cluster.start_run(&request).await.unwrap();

    let log = temp_file_with("", "log");
    let polls = follow_run(
        &cluster,
        &request.run_id,
        log.path(),
        Duration::from_millis(200),
    )
    .await
    .unwrap();
    assert!(polls >= 2, "polls = {polls}");

    let content = std::fs::read_to_string(log.path()).unwrap();
    for agent in cluster.agents() {
        let name = agent.address().to_string();
        assert!(content
            .lines()
            .any(|l| l.contains(&name) && l.contains(".success\tcount")));
    }
    let last_iteration = (polls - 1).to_string();
    assert!(content
        .lines()
        .any(|l| l.split('\t').next() == Some(last_iteration.as_str())));
}
