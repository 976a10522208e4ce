//! Timing and counting laws of the three stop conditions.

use load_engine::{BoxGenerator, BoxLoader, EngineConfig, LoadGenerator, Properties};
use std::time::Duration;
use test_utils::{
    assert_duration_between, elapsed_of, paced_duration, ConstGenerator, CountingLoader, Probe,
    SleepingGenerator, SleepingLoader,
};

fn endless() -> BoxGenerator<u32> {
    Box::new(ConstGenerator::endless(7))
}

fn counting(probe: &std::sync::Arc<Probe>) -> BoxLoader<u32> {
    Box::new(CountingLoader::new(std::sync::Arc::clone(probe)))
}

// ============================================================================
// Task count limit
// ============================================================================

#[test]
fn test_exact_task_count() {
    let probe = Probe::new();
    let engine = LoadGenerator::with_limits(-1, 100, -1.0);
    let stats = engine
        .run_to_completion(
            vec![endless(), endless()],
            vec![counting(&probe), counting(&probe), counting(&probe)],
            Properties::new(),
        )
        .unwrap();

    assert_eq!(probe.calls(), 100);
    assert_eq!(stats.success.count, 100);
    assert_eq!(stats.exceptions.count, 0);
    assert_eq!(stats.queries.meter.count, 100);
}

#[test]
fn test_exact_task_count_with_many_producers() {
    let probe = Probe::new();
    let engine = LoadGenerator::new(EngineConfig::with_limits(-1, 1000, -1.0).generator_threads(8));
    let generators = (0..8).map(|_| endless()).collect();
    engine
        .run_to_completion(generators, vec![counting(&probe)], Properties::new())
        .unwrap();
    assert_eq!(probe.calls(), 1000);
}

#[test]
fn test_finite_generators_end_the_run() {
    let probe = Probe::new();
    let engine = LoadGenerator::new(EngineConfig::default());
    let generators: Vec<BoxGenerator<u32>> = (0..3)
        .map(|_| Box::new(ConstGenerator::<u32>::limited(1, 5)) as BoxGenerator<u32>)
        .collect();
    let stats = engine
        .run_to_completion(generators, vec![counting(&probe)], Properties::new())
        .unwrap();
    assert_eq!(stats.success.count, 15);
}

// ============================================================================
// Duration limit
// ============================================================================

#[test]
fn test_duration_limit() {
    let probe = Probe::new();
    let engine = LoadGenerator::with_limits(2, -1, -1.0);
    let (result, elapsed) = elapsed_of(|| {
        engine.run_to_completion(vec![endless()], vec![counting(&probe)], Properties::new())
    });
    let stats = result.unwrap();

    assert_duration_between!(elapsed, 1.99, 2.25);
    assert!(stats.success.count > 0);
    assert!(stats.duration >= 1990);
}

#[test]
fn test_task_limit_wins_over_duration() {
    let probe = Probe::new();
    let engine = LoadGenerator::with_limits(10, 5, -1.0);
    let (result, elapsed) = elapsed_of(|| {
        engine.run_to_completion(vec![endless()], vec![counting(&probe)], Properties::new())
    });
    result.unwrap();
    assert_eq!(probe.calls(), 5);
    assert!(elapsed < Duration::from_secs(2));
}

// ============================================================================
// Rate limit
// ============================================================================

#[test]
fn test_rate_limit() {
    let probe = Probe::new();
    let engine = LoadGenerator::with_limits(-1, 20, 10.0);
    let (result, elapsed) = elapsed_of(|| {
        engine.run_to_completion(vec![endless()], vec![counting(&probe)], Properties::new())
    });
    result.unwrap();

    assert_eq!(probe.calls(), 20);
    assert!(elapsed >= paced_duration(20, 10.0));
    assert_duration_between!(elapsed, 1.8, 2.2);
}

#[test]
fn test_rate_limit_is_shared_by_producers() {
    let probe = Probe::new();
    let engine = LoadGenerator::new(EngineConfig::with_limits(-1, 20, 10.0).generator_threads(4));
    let generators = (0..4).map(|_| endless()).collect();
    let (result, elapsed) = elapsed_of(|| {
        engine.run_to_completion(
            generators,
            vec![counting(&probe), counting(&probe)],
            Properties::new(),
        )
    });
    result.unwrap();

    assert_eq!(probe.calls(), 20);
    assert_duration_between!(elapsed, 1.8, 2.2);
}

#[test]
fn test_rate_and_duration_compose() {
    let probe = Probe::new();
    let engine = LoadGenerator::with_limits(1, -1, 10.0);
    let (result, elapsed) = elapsed_of(|| {
        engine.run_to_completion(vec![endless()], vec![counting(&probe)], Properties::new())
    });
    result.unwrap();

    assert_duration_between!(elapsed, 0.99, 1.25);
    // Start times are 0.0s, 0.1s, ... so at most 11 fit into one second.
    assert!(probe.calls() >= 9 && probe.calls() <= 11, "calls = {}", probe.calls());
}

// ============================================================================
// Worker fan-out
// ============================================================================

#[test]
fn test_producer_fan_out() {
    let probe = Probe::new();
    let engine = LoadGenerator::new(EngineConfig::with_limits(-1, 200, -1.0).generator_threads(4));
    let generators: Vec<BoxGenerator<u64>> = (0..4)
        .map(|_| Box::new(SleepingGenerator::new(Duration::from_millis(40))) as BoxGenerator<u64>)
        .collect();
    let loaders: Vec<BoxLoader<u64>> = vec![Box::new(CountingLoader::new(probe.clone()))];

    let (result, elapsed) =
        elapsed_of(|| engine.run_to_completion(generators, loaders, Properties::new()));
    result.unwrap();

    assert_eq!(probe.calls(), 200);
    assert_duration_between!(elapsed, 1.8, 2.4);
}

#[test]
fn test_consumer_fan_out() {
    let probe = Probe::new();
    let engine = LoadGenerator::with_limits(-1, 200, -1.0);
    let loaders: Vec<BoxLoader<u32>> = (0..4)
        .map(|_| {
            Box::new(SleepingLoader::new(Duration::from_millis(40)).with_probe(probe.clone()))
                as BoxLoader<u32>
        })
        .collect();

    let (result, elapsed) =
        elapsed_of(|| engine.run_to_completion(vec![endless()], loaders, Properties::new()));
    result.unwrap();

    assert_eq!(probe.calls(), 200);
    assert_duration_between!(elapsed, 1.8, 2.4);
}
