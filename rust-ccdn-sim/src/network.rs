//! Simulated hop-by-hop datagram network.
//!
//! Every switch runs its own [`RoutingEngine`]. A datagram moves one link per
//! scheduled arrival; the driver feeds the returned [`Outcome`] back into the
//! scheduler. Bulk content transfers are modeled at flow level.

use bytes::Bytes;
use log::{debug, trace, warn};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use rust_ccdn_common::{
    metrics::CcdnMetrics,
    types::{PacketHeader, Protocol, LOOPBACK_INTERFACE},
    CmpPacket, Error, HostId, InterfaceId, Result, SimulationConfig,
};
use rust_ccdn_routing::RoutingEngine;

use crate::topology::{FatTree, NodeId};

/// IPv4 + UDP header bytes added to every CMP payload on the wire.
const DATAGRAM_OVERHEAD: u64 = 28;

/// A datagram in flight.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub header: PacketHeader,
    pub payload: Bytes,
    /// Switch hops left before the datagram is dropped
    pub hops_left: u8,
}

/// Next arrival of a datagram.
#[derive(Debug, Clone)]
pub struct Hop {
    pub delay: Duration,
    pub node: NodeId,
    pub interface: InterfaceId,
    pub datagram: Datagram,
}

/// A CMP packet handed to a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Host that accepted the packet
    pub host: HostId,
    /// Host that sent it
    pub from: HostId,
    pub packet: CmpPacket,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Hop(Hop),
    Deliver(Delivery),
    Drop,
}

pub struct Network {
    topology: FatTree,
    engines: Vec<RoutingEngine>,
    link_delay: Duration,
    link_rate_bps: u64,
    data_size: u64,
    hop_limit: u8,
    metrics: Arc<CcdnMetrics>,
}

impl Network {
    /// Build the tree and one routing engine per node.
    pub fn new(config: &SimulationConfig, metrics: Arc<CcdnMetrics>) -> Result<Self> {
        let topology = FatTree::build(config.port)?;
        let fib_capacity = NonZeroUsize::new(config.fib_size)
            .ok_or_else(|| Error::Config("fib_size must be at least 1".into()))?;

        let engines = topology
            .nodes()
            .iter()
            .enumerate()
            .map(|(id, node)| {
                let mut engine = RoutingEngine::new(
                    node.position,
                    node.interface_count(),
                    fib_capacity,
                    config.seed.wrapping_add(id as u64),
                    metrics.clone(),
                );
                engine.set_content_routing(config.enable_cache);
                engine
            })
            .collect();

        debug!(
            "built fat tree: port {}, {} switches, {} hosts",
            topology.port(),
            topology.switch_count(),
            topology.host_count()
        );

        Ok(Self {
            topology,
            engines,
            link_delay: config.link_delay(),
            link_rate_bps: config.link_rate_bps,
            data_size: config.data_size,
            hop_limit: config.hop_limit,
            metrics,
        })
    }

    pub fn topology(&self) -> &FatTree {
        &self.topology
    }

    pub fn engine(&self, node: NodeId) -> Option<&RoutingEngine> {
        self.engines.get(node)
    }

    pub fn engine_mut(&mut self, node: NodeId) -> Option<&mut RoutingEngine> {
        self.engines.get_mut(node)
    }

    /// Time to push `bytes` over one link.
    pub fn hop_delay(&self, bytes: u64) -> Duration {
        self.link_delay + self.serialization(bytes)
    }

    fn serialization(&self, bytes: u64) -> Duration {
        let nanos = bytes as u128 * 8 * 1_000_000_000 / self.link_rate_bps as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Number of links between two hosts.
    pub fn link_distance(&self, a: HostId, b: HostId) -> u32 {
        self.topology
            .host_location(a)
            .distance(&self.topology.host_location(b))
    }

    /// Duration of a bulk transfer of one content from `holder` to `requester`.
    pub fn transfer_time(&self, holder: HostId, requester: HostId) -> Duration {
        self.link_delay * self.link_distance(holder, requester) + self.serialization(self.data_size)
    }

    /// Launch a CMP datagram from one host to another.
    pub fn send_cmp(&mut self, from: HostId, to: HostId, packet: CmpPacket) -> Result<Outcome> {
        let src_node = self.host_node(from)?;
        let src = self.topology.nodes()[src_node].address;
        let dst = self
            .topology
            .host_address(to)
            .ok_or_else(|| Error::Topology(format!("unknown host {}", to)))?;

        let datagram = Datagram {
            header: PacketHeader::udp(src, dst),
            payload: packet.to_bytes(),
            hops_left: self.hop_limit,
        };

        trace!("host {} sends {} to host {}", from, packet, to);

        if from == to {
            return Ok(Outcome::Hop(Hop {
                delay: Duration::ZERO,
                node: src_node,
                interface: LOOPBACK_INTERFACE,
                datagram,
            }));
        }

        let out = match self.engines[src_node].route_output(dst, src) {
            Ok(iface) => iface,
            Err(e) => return Ok(self.drop_packet(src_node, &datagram, e)),
        };
        Ok(self.forward(src_node, out, datagram))
    }

    /// Handle a datagram arriving at `node` on `interface`.
    pub fn arrive(&mut self, node: NodeId, interface: InterfaceId, mut datagram: Datagram) -> Outcome {
        if let Some(host) = self.topology.node_host(node) {
            return self.deliver(host, &datagram);
        }

        if datagram.hops_left == 0 {
            warn!("hop limit exceeded at node {}, dropping {:?}", node, datagram.header);
            self.metrics.packets_dropped.increment();
            return Outcome::Drop;
        }
        datagram.hops_left -= 1;

        let routed = match self.engines.get_mut(node) {
            Some(engine) => engine.route_input(&datagram.header, &datagram.payload, interface),
            None => Err(Error::Topology(format!("unknown node {}", node))),
        };
        match routed {
            Ok(out) => self.forward(node, out, datagram),
            Err(e) => self.drop_packet(node, &datagram, e),
        }
    }

    fn deliver(&mut self, host: HostId, datagram: &Datagram) -> Outcome {
        if datagram.header.protocol != Protocol::Udp {
            debug!("host {} ignores non-datagram traffic", host);
            return Outcome::Drop;
        }
        let packet = match CmpPacket::from_slice(&datagram.payload) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("host {} dropped malformed CMP packet: {}", host, e);
                self.metrics.packets_dropped.increment();
                return Outcome::Drop;
            }
        };
        let from = match self.topology.host_by_address(datagram.header.src) {
            Some(from) => from,
            None => {
                warn!("host {} dropped CMP packet from unknown source {}", host, datagram.header.src);
                self.metrics.packets_dropped.increment();
                return Outcome::Drop;
            }
        };

        self.metrics.packets_delivered.increment();
        Outcome::Deliver(Delivery { host, from, packet })
    }

    fn forward(&mut self, node: NodeId, out: InterfaceId, datagram: Datagram) -> Outcome {
        let link = match self.topology.node(node).and_then(|n| n.link(out)) {
            Some(link) => link,
            None => {
                let e = Error::NoRoute(format!("node {} has no interface {}", node, out));
                return self.drop_packet(node, &datagram, e);
            }
        };

        self.metrics.packets_forwarded.increment();
        Outcome::Hop(Hop {
            delay: self.hop_delay(datagram.payload.len() as u64 + DATAGRAM_OVERHEAD),
            node: link.peer,
            interface: link.peer_interface,
            datagram,
        })
    }

    fn drop_packet(&self, node: NodeId, datagram: &Datagram, e: Error) -> Outcome {
        warn!(
            "node {} dropped {} -> {}: {}",
            node, datagram.header.src, datagram.header.dst, e
        );
        if matches!(e, Error::NoRoute(_)) {
            self.metrics.no_route.increment();
        }
        self.metrics.packets_dropped.increment();
        Outcome::Drop
    }

    fn host_node(&self, host: HostId) -> Result<NodeId> {
        self.topology
            .host_node(host)
            .ok_or_else(|| Error::Topology(format!("unknown host {}", host)))
    }
}
