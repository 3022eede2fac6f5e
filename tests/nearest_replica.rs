use rust_ccdn::{sim::parse_scenario, AuditLog, HostId, Simulation, SimulationConfig};

fn run(script: &str) -> Simulation {
    let mut sim = Simulation::new(SimulationConfig::default(), AuditLog::in_memory()).unwrap();
    sim.schedule_scenario(parse_scenario(script).unwrap()).unwrap();
    sim.run().unwrap();
    sim
}

#[test]
fn test_closest_original_serves() {
    // Host 13 shares an edge switch with 12; host 0 shares a subtree with 3.
    let sim = run("\
c 0 0000000000000001 2 3 12
a 1 0000000000000001 13
a 1 0000000000000001 0
");

    let records = sim.coordinator().tasks().audit().records();
    assert_eq!(records.len(), 2);
    for record in records {
        let expected = if record.local == HostId(13) { HostId(12) } else { HostId(3) };
        assert_eq!(record.remote, expected, "{}", record);
    }
}

#[test]
fn test_transfer_time_grows_with_distance() {
    let sim = run("\
c 0 0000000000000001 1 12
a 1 0000000000000001 13
a 1 0000000000000001 0
");

    let records = sim.coordinator().tasks().audit().records();
    let elapsed = |host: u32| {
        records
            .iter()
            .find(|r| r.local == HostId(host))
            .map(|r| r.end - r.start)
            .unwrap()
    };
    assert!(elapsed(13) < elapsed(0));
}

#[test]
fn test_same_seed_same_run() {
    let script = "\
c 0 0000000000000001 2 0 12
a 1 0000000000000001 7
a 1 0000000000000001 8
a 2 0000000000000001 6
";
    let first = run(script);
    let second = run(script);
    assert_eq!(
        first.coordinator().tasks().audit().records(),
        second.coordinator().tasks().audit().records()
    );
    assert_eq!(first.summary().events, second.summary().events);
}
