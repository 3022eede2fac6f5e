//! Scenario run command implementation for ccdn CLI

use anyhow::{Context, Result};
use log::{debug, info};
use rust_ccdn_common::SimulationConfig;
use rust_ccdn_sim::{load_scenario, AuditLog, RunSummary, Simulation};

use crate::{
    utils::{format_bytes, format_duration, print_header, Timer},
    RunArgs,
};

/// Build the configuration for a run: file and environment first, then flags.
pub fn resolve_config(args: &RunArgs) -> Result<SimulationConfig> {
    let mut config = SimulationConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(fib_size) = args.fib_size {
        config.fib_size = fib_size;
    }
    if let Some(cache_size) = args.cache_size {
        config.cache_size = cache_size;
    }
    if let Some(enable_cache) = args.enable_cache {
        config.enable_cache = enable_cache;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.duration.is_some() {
        config.duration = args.duration;
    }

    config.validate().context("Invalid configuration")?;
    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

/// Run a scenario script and print what happened
pub async fn run_scenario(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    info!(
        "Running {} on a k={} fat tree",
        args.scenario.display(),
        config.port
    );

    let script = load_scenario(&args.scenario)
        .with_context(|| format!("Failed to read scenario {}", args.scenario.display()))?;
    let audit = AuditLog::create(&config.output)
        .with_context(|| format!("Failed to open task log {}", config.output.display()))?;

    let limit = config.duration();
    let mut sim = Simulation::new(config, audit).context("Failed to build simulation")?;
    sim.schedule_scenario(script)?;

    let summary = {
        let _timer = Timer::new("simulation");
        sim.run_until(limit)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&sim, &summary);
    }

    Ok(())
}

fn print_summary(sim: &Simulation, summary: &RunSummary) {
    let config = sim.config();
    let topology = sim.network().topology();

    print_header("Simulation");
    println!("  Fat tree:           k={} ({} switches, {} hosts)", config.port, topology.switch_count(), topology.host_count());
    println!("  Content routing:    FIB {} entries, cache {} entries ({})",
        config.fib_size,
        config.cache_size,
        if config.enable_cache { "enabled" } else { "disabled" }
    );
    println!("  Transfer size:      {}", format_bytes(config.data_size));
    println!("  Simulated time:     {}", format_duration(sim.now()));
    println!("  Events:             {}", summary.events);
    println!("  Task log:           {}", config.output.display());

    print_header("Tasks");
    println!("  Finished:           {}", summary.finished_tasks);
    println!("  Outstanding:        {}", summary.outstanding_tasks);
    println!("  Abandoned:          {}", summary.abandoned_tasks);
    println!("  Retries:            {}", summary.metrics.retries);
    println!("  Mean fetch latency: {:.1}µs", summary.metrics.mean_fetch_latency_us);

    let m = &summary.metrics;
    print_header("Packets");
    println!("  Requests sent:      {}", m.requests_sent);
    println!("  Replies sent:       {}", m.replies_sent);
    println!("  Rejects sent:       {}", m.rejects_sent);
    println!("  Finishes sent:      {}", m.finishes_sent);
    println!("  Forwarded:          {}", m.packets_forwarded);
    println!("  Dropped:            {}", m.packets_dropped);
    println!("  FIB hits / misses:  {} / {}", m.fib_hits, m.fib_misses);
    println!("  Cache hits:         {}", m.cache_hits);
}
