//! Discrete-event simulation of ccdn in a fat-tree data center.
//!
//! The [`Simulation`] owns the event queue, the simulated network (one
//! [`rust_ccdn_routing::RoutingEngine`] per node) and the
//! [`ContentCoordinator`]. Scenario actions, packet arrivals, transfer
//! completions and periodic task reviews are all events on one queue.

pub mod audit;
pub mod coordinator;
pub mod directory;
pub mod network;
pub mod scenario;
pub mod scheduler;
pub mod tasks;
pub mod topology;

use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use rust_ccdn_common::{
    metrics::{CcdnMetrics, MetricsSnapshot},
    CmpPacket, ContentId, Error, HostId, Result, SimulationConfig, Version,
};

pub use audit::{AuditLog, TaskRecord};
pub use coordinator::{ContentCoordinator, Transport};
pub use network::{Datagram, Network, Outcome};
pub use scenario::{load_scenario, parse_scenario, ScenarioAction, ScenarioEvent};
pub use scheduler::Scheduler;
pub use topology::{FatTree, NodeId};

/// Something that happens at a point in virtual time.
#[derive(Debug, Clone)]
pub enum Event {
    Script(ScenarioAction),
    Review,
    Arrive {
        node: NodeId,
        interface: usize,
        datagram: Datagram,
    },
    TransferComplete {
        holder: HostId,
        requester: HostId,
        content: ContentId,
        version: Version,
    },
}

/// Result of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub events: u64,
    pub finished_tasks: usize,
    pub outstanding_tasks: usize,
    pub abandoned_tasks: u64,
    pub final_time_secs: f64,
    pub metrics: MetricsSnapshot,
}

/// The coordinator's view of the network: the clock and the packet layer.
struct SimContext<'a> {
    scheduler: &'a mut Scheduler<Event>,
    network: &'a mut Network,
}

impl SimContext<'_> {
    fn dispatch(&mut self, outcome: Outcome) {
        if let Outcome::Hop(hop) = outcome {
            self.scheduler.schedule_in(
                hop.delay,
                Event::Arrive {
                    node: hop.node,
                    interface: hop.interface,
                    datagram: hop.datagram,
                },
            );
        }
    }
}

impl Transport for SimContext<'_> {
    fn now(&self) -> Duration {
        self.scheduler.now()
    }

    fn send_cmp(&mut self, from: HostId, to: HostId, packet: CmpPacket) -> Result<()> {
        let outcome = self.network.send_cmp(from, to, packet)?;
        self.dispatch(outcome);
        Ok(())
    }

    fn start_transfer(
        &mut self,
        holder: HostId,
        requester: HostId,
        content: ContentId,
        version: Version,
    ) -> Result<()> {
        let delay = self.network.transfer_time(holder, requester);
        debug!(
            "transfer of {} v{} from host {} to host {} takes {:?}",
            content, version, holder, requester, delay
        );
        self.scheduler.schedule_in(
            delay,
            Event::TransferComplete {
                holder,
                requester,
                content,
                version,
            },
        );
        Ok(())
    }
}

pub struct Simulation {
    config: SimulationConfig,
    scheduler: Scheduler<Event>,
    network: Network,
    coordinator: ContentCoordinator,
    metrics: Arc<CcdnMetrics>,
    reviews: u32,
    review_queued: bool,
    events: u64,
}

impl Simulation {
    pub fn new(config: SimulationConfig, audit: AuditLog) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(CcdnMetrics::new());
        let network = Network::new(&config, metrics.clone())?;
        let coordinator = ContentCoordinator::new(
            &config,
            network.topology().host_count(),
            audit,
            metrics.clone(),
        )?;

        Ok(Self {
            config,
            scheduler: Scheduler::new(),
            network,
            coordinator,
            metrics,
            reviews: 0,
            review_queued: false,
            events: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn coordinator(&self) -> &ContentCoordinator {
        &self.coordinator
    }

    pub fn metrics(&self) -> &Arc<CcdnMetrics> {
        &self.metrics
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Queue every scenario action at its time.
    pub fn schedule_scenario(&mut self, events: Vec<ScenarioEvent>) -> Result<()> {
        let host_count = self.network.topology().host_count();
        let check = |host: &HostId| {
            if host.index() < host_count {
                Ok(())
            } else {
                Err(Error::Topology(format!(
                    "scenario names host {} but the tree has {} hosts",
                    host, host_count
                )))
            }
        };

        for event in &events {
            match &event.action {
                ScenarioAction::Create { hosts, .. } => hosts.iter().try_for_each(check)?,
                ScenarioAction::Access { host, .. } => check(host)?,
                ScenarioAction::Update { .. } => {}
            }
        }

        info!("scheduling {} scenario events", events.len());
        for event in events {
            self.scheduler.schedule_at(event.at, Event::Script(event.action));
        }
        Ok(())
    }

    /// Reviews run at multiples of the review interval. With a duration they
    /// stop once past it; without one they stop when nothing else is queued
    /// and no task waits for a reply.
    fn schedule_next_review(&mut self) {
        let interval = self.config.review_interval();
        let mut at = interval * (self.reviews + 1);
        while at < self.scheduler.now() {
            self.reviews += 1;
            at = interval * (self.reviews + 1);
        }
        let keep_going = match self.config.duration() {
            Some(limit) => at <= limit,
            None => !self.scheduler.is_empty() || self.coordinator.tasks().pending() > 0,
        };
        if keep_going {
            self.reviews += 1;
            self.review_queued = true;
            self.scheduler.schedule_at(at, Event::Review);
        }
    }

    /// Run until the queue is empty.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_until(None)
    }

    /// Run events with timestamps up to `limit` (all events if `None`).
    pub fn run_until(&mut self, limit: Option<Duration>) -> Result<RunSummary> {
        if !self.review_queued {
            self.schedule_next_review();
        }
        loop {
            match (self.scheduler.peek_time(), limit) {
                (None, _) => break,
                (Some(at), Some(limit)) if at > limit => break,
                _ => {}
            }
            let (_, event) = match self.scheduler.pop() {
                Some(next) => next,
                None => break,
            };
            self.events += 1;
            self.handle(event)?;
        }

        let summary = self.summary();
        info!(
            "stopped at {:.6}s after {} events: {} tasks finished, {} outstanding",
            summary.final_time_secs, summary.events, summary.finished_tasks, summary.outstanding_tasks
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            events: self.events,
            finished_tasks: self.coordinator.tasks().audit().records().len(),
            outstanding_tasks: self.coordinator.tasks().len(),
            abandoned_tasks: self.metrics.tasks_abandoned.value(),
            final_time_secs: self.scheduler.now().as_secs_f64(),
            metrics: self.metrics.snapshot(),
        }
    }

    fn handle(&mut self, event: Event) -> Result<()> {
        let mut ctx = SimContext {
            scheduler: &mut self.scheduler,
            network: &mut self.network,
        };

        match event {
            Event::Script(ScenarioAction::Create { content, hosts }) => {
                self.coordinator.create_content(content, hosts)?;
            }
            Event::Script(ScenarioAction::Update { content }) => {
                self.coordinator.update_content(content);
            }
            Event::Script(ScenarioAction::Access { host, content }) => {
                self.coordinator.request_content(&mut ctx, host, content)?;
            }
            Event::Review => {
                self.review_queued = false;
                self.coordinator.review(&mut ctx)?;
                self.schedule_next_review();
            }
            Event::Arrive {
                node,
                interface,
                datagram,
            } => match ctx.network.arrive(node, interface, datagram) {
                Outcome::Deliver(d) => {
                    self.coordinator.handle_cmp(&mut ctx, d.host, d.from, d.packet)?;
                }
                outcome => ctx.dispatch(outcome),
            },
            Event::TransferComplete {
                holder,
                requester,
                content,
                version,
            } => {
                self.coordinator
                    .on_transfer_complete(&mut ctx, holder, requester, content, version)?;
            }
        }
        Ok(())
    }
}
