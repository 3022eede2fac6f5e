use rust_ccdn_common::{ContentId, HostId, SimulationConfig};
use rust_ccdn_sim::{parse_scenario, AuditLog, Simulation, TaskRecord};
use rust_ccdn_tables::CachedContent;
use std::time::Duration;

fn simulate(config: SimulationConfig, script: &str) -> Simulation {
    let mut sim = Simulation::new(config, AuditLog::in_memory()).unwrap();
    sim.schedule_scenario(parse_scenario(script).unwrap()).unwrap();
    sim.run().unwrap();
    sim
}

fn records(sim: &Simulation) -> Vec<TaskRecord> {
    sim.coordinator().tasks().audit().records().to_vec()
}

fn record_for(sim: &Simulation, local: u32) -> TaskRecord {
    records(sim)
        .into_iter()
        .find(|r| r.local == HostId(local))
        .unwrap_or_else(|| panic!("no finished task for host {}", local))
}

const CONTENT: ContentId = ContentId(1);

#[test]
fn test_fetch_from_original_holder() {
    let sim = simulate(
        SimulationConfig::default(),
        "c 0 0000000000000001 1 3\na 1 0000000000000001 7\n",
    );

    let log = records(&sim);
    assert_eq!(log.len(), 1);
    assert!(
        log[0].to_string().starts_with("1 from 3 to 7 start 1 end 1.08"),
        "unexpected audit line {}",
        log[0]
    );

    let summary = sim.summary();
    assert_eq!(summary.outstanding_tasks, 0);
    assert_eq!(summary.metrics.requests_sent, 1);
    assert_eq!(summary.metrics.replies_sent, 1);
    assert_eq!(summary.metrics.finishes_sent, 1);
    assert_eq!(summary.metrics.finish_acks_sent, 1);
    assert_eq!(summary.metrics.retries, 0);

    let cached: Vec<CachedContent> = sim
        .coordinator()
        .cache(HostId(7))
        .unwrap()
        .iter()
        .copied()
        .collect();
    assert_eq!(
        cached,
        vec![CachedContent {
            content: CONTENT,
            version: 0
        }]
    );
}

#[test]
fn test_neighbour_serves_from_cache() {
    let sim = simulate(
        SimulationConfig::default(),
        "\
c 0 0000000000000001 1 3
a 1 0000000000000001 7
a 3 0000000000000001 6
",
    );

    assert_eq!(record_for(&sim, 7).remote, HostId(3));
    assert_eq!(record_for(&sim, 6).remote, HostId(7));
    assert_eq!(sim.metrics().cache_hits.value(), 1);
}

#[test]
fn test_cache_disabled_goes_to_holder() {
    let config = SimulationConfig {
        enable_cache: false,
        ..Default::default()
    };
    let sim = simulate(
        config,
        "\
c 0 0000000000000001 1 3
a 1 0000000000000001 7
a 3 0000000000000001 6
",
    );

    assert_eq!(record_for(&sim, 6).remote, HostId(3));
    assert_eq!(sim.metrics().cache_hits.value(), 0);
}

#[test]
fn test_update_invalidates_cached_copies() {
    let sim = simulate(
        SimulationConfig::default(),
        "\
c 0 0000000000000001 1 3
a 1 0000000000000001 7
u 2 0000000000000001
a 3 0000000000000001 6
",
    );

    assert_eq!(record_for(&sim, 6).remote, HostId(3));
    assert_eq!(sim.coordinator().get_content(CONTENT).unwrap().version, 1);
}

#[test]
fn test_refetch_replaces_stale_copy() {
    let sim = simulate(
        SimulationConfig::default(),
        "\
c 0 0000000000000001 1 3
a 1 0000000000000001 7
u 2 0000000000000001
a 3 0000000000000001 6
a 4 0000000000000001 7
",
    );

    assert_eq!(records(&sim).len(), 3);
    let cached: Vec<CachedContent> = sim
        .coordinator()
        .cache(HostId(7))
        .unwrap()
        .iter()
        .copied()
        .collect();
    assert_eq!(
        cached,
        vec![CachedContent {
            content: CONTENT,
            version: 1
        }]
    );
}

#[test]
fn test_unknown_content_is_retried_until_duration() {
    let config = SimulationConfig {
        duration: Some(1.9),
        ..Default::default()
    };
    let sim = simulate(config, "a 1 0000000000000002 7\n");

    let summary = sim.summary();
    assert!(records(&sim).is_empty());
    assert_eq!(summary.outstanding_tasks, 1);
    assert_eq!(summary.metrics.requests_sent, 2);
    assert_eq!(summary.metrics.rejects_sent, 2);
    assert_eq!(summary.metrics.retries, 1);
    assert!(summary.final_time_secs <= 1.9);
}

#[test]
fn test_unknown_content_retried_once_per_timeout_with_defaults() {
    let mut sim = Simulation::new(SimulationConfig::default(), AuditLog::in_memory()).unwrap();
    sim.schedule_scenario(parse_scenario("a 1 0000000000000002 7\n").unwrap())
        .unwrap();

    let summary = sim.run_until(Some(Duration::from_millis(1900))).unwrap();
    assert_eq!(summary.metrics.requests_sent, 2);
    assert_eq!(summary.metrics.retries, 1);
    assert_eq!(summary.outstanding_tasks, 1);
}

#[test]
fn test_unknown_content_abandoned_after_max_retries() {
    let sim = simulate(SimulationConfig::default(), "a 1 0000000000000002 7\n");

    let summary = sim.summary();
    assert!(records(&sim).is_empty());
    assert_eq!(summary.metrics.requests_sent, 4);
    assert_eq!(summary.metrics.rejects_sent, 4);
    assert_eq!(summary.metrics.retries, 3);
    assert_eq!(summary.outstanding_tasks, 0);
    assert_eq!(summary.abandoned_tasks, 1);
    assert!((summary.final_time_secs - 3.0).abs() < 1e-9);
}

#[test]
fn test_scenario_rejects_hosts_outside_tree() {
    let mut sim = Simulation::new(SimulationConfig::default(), AuditLog::in_memory()).unwrap();
    let script = parse_scenario("a 1 0000000000000001 16\n").unwrap();
    assert!(sim.schedule_scenario(script).is_err());
}

#[test]
fn test_out_of_range_timeout_fails_to_build() {
    let config = SimulationConfig {
        timeout: 1e30,
        ..Default::default()
    };
    assert!(Simulation::new(config, AuditLog::in_memory()).is_err());
}

#[test]
fn test_audit_file_matches_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.log");

    let mut sim = Simulation::new(SimulationConfig::default(), AuditLog::create(&path).unwrap()).unwrap();
    sim.schedule_scenario(
        parse_scenario("c 0 0000000000000001 2 3 12\na 1 0000000000000001 7\na 1 0000000000000001 0\n")
            .unwrap(),
    )
    .unwrap();
    let summary = sim.run().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert_eq!(summary.finished_tasks, 2);
    for line in text.lines() {
        assert!(line.starts_with("1 from "), "unexpected audit line {}", line);
    }
}
