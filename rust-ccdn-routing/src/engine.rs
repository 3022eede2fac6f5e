//! Per-node routing decisions.
//!
//! CMP datagrams passing through a switch teach it where content lives:
//! Requests record the structural path towards the addressed holder, Replies
//! and FinishAcks record the interface they came in on, Rejects withdraw it.
//! A Request that misses the FIB is pushed upward along a content-hashed port
//! so later Requests for the same content meet the state left by earlier ones.

use log::{debug, trace, warn};
use rand::{rngs::StdRng, SeedableRng};
use std::net::Ipv4Addr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use rust_ccdn_common::{
    metrics::CcdnMetrics,
    types::{PacketHeader, Protocol},
    CmpPacket, CmpType, InterfaceId, NodePosition, Result,
};
use rust_ccdn_tables::ContentFib;

use crate::hash::{content_hash, false_content_hash};
use crate::structural::{is_downward, structural_route};

/// Routing state owned by one node.
#[derive(Debug)]
pub struct RoutingEngine {
    position: NodePosition,
    interface_count: usize,
    /// Only switches keep a FIB
    fib: Option<ContentFib>,
    content_routing: bool,
    rng: StdRng,
    metrics: Arc<CcdnMetrics>,
}

impl RoutingEngine {
    /// Create the engine for a node. Switches get a FIB of `fib_capacity`
    /// entries; hosts get none.
    pub fn new(
        position: NodePosition,
        interface_count: usize,
        fib_capacity: NonZeroUsize,
        seed: u64,
        metrics: Arc<CcdnMetrics>,
    ) -> Self {
        let fib = position
            .role
            .is_switch()
            .then(|| ContentFib::new(interface_count, fib_capacity));

        Self {
            position,
            interface_count,
            fib,
            content_routing: true,
            rng: StdRng::seed_from_u64(seed),
            metrics,
        }
    }

    pub fn position(&self) -> NodePosition {
        self.position
    }

    pub fn interface_count(&self) -> usize {
        self.interface_count
    }

    pub fn fib(&self) -> Option<&ContentFib> {
        self.fib.as_ref()
    }

    pub fn fib_mut(&mut self) -> Option<&mut ContentFib> {
        self.fib.as_mut()
    }

    pub fn content_routing(&self) -> bool {
        self.content_routing
    }

    /// Enable or disable forwarding by content. When disabled every packet
    /// is routed by address.
    pub fn set_content_routing(&mut self, enabled: bool) {
        self.content_routing = enabled;
    }

    fn half(&self) -> usize {
        self.interface_count / 2
    }

    fn downward(&self, iface: InterfaceId) -> bool {
        is_downward(iface, self.interface_count)
    }

    /// Route a locally originated packet.
    pub fn route_output(&self, dst: Ipv4Addr, src: Ipv4Addr) -> Result<InterfaceId> {
        structural_route(self.position, self.interface_count, dst, src)
    }

    /// Route a packet that arrived on `incoming`.
    pub fn route_input(
        &mut self,
        header: &PacketHeader,
        payload: &[u8],
        incoming: InterfaceId,
    ) -> Result<InterfaceId> {
        if header.is_non_unicast() {
            return structural_route(self.position, self.interface_count, header.dst, header.src);
        }

        if header.protocol == Protocol::Udp && self.content_routing && self.fib.is_some() {
            match CmpPacket::from_slice(payload) {
                Ok(packet) => return self.content_route(header, &packet, incoming),
                Err(e) => {
                    warn!("{}: undecodable CMP payload, routing by address: {}", self.position, e);
                }
            }
        }

        structural_route(self.position, self.interface_count, header.dst, header.src)
    }

    /// Pick the output interface for a CMP packet and update the FIB.
    pub fn content_route(
        &mut self,
        header: &PacketHeader,
        packet: &CmpPacket,
        incoming: InterfaceId,
    ) -> Result<InterfaceId> {
        let structural = structural_route(self.position, self.interface_count, header.dst, header.src);
        let role = self.position.role;
        let root = role.is_root_tier();
        let half = self.half();
        let incoming_down = self.downward(incoming);
        let (content, version) = (packet.content, packet.version);

        trace!("{}: {} in on {}", self.position, packet, incoming);

        let fib = match self.fib.as_mut() {
            Some(fib) => fib,
            None => return structural,
        };

        match packet.kind {
            CmpType::Finish => structural,
            CmpType::Request => {
                fib.remove_interface(content, version, incoming);

                let towards = structural?;
                if is_downward(towards, self.interface_count) {
                    fib.insert_interface(content, version, towards);
                }

                if let Some(iface) = fib.forwarding_interface(content, version, &mut self.rng) {
                    self.metrics.fib_hits.increment();
                    debug!("{}: FIB hit for {} v{} -> {}", self.position, content, version, iface);
                    return Ok(iface);
                }
                self.metrics.fib_misses.increment();

                let escalate = if incoming_down && !root {
                    content_hash(role, half, content)
                } else {
                    None
                };
                match escalate {
                    Some(hash) => {
                        self.metrics.hash_escalations.increment();
                        trace!("{}: escalate {} via hashed port {}", self.position, content, hash);
                        Ok(hash)
                    }
                    None => {
                        fib.insert_interface(content, version, towards);
                        Ok(towards)
                    }
                }
            }
            CmpType::Reply | CmpType::FinishAck => {
                if incoming_down {
                    fib.insert_interface(content, version, incoming);
                    fib.refresh(content, version);
                    if let Some(hash) = content_hash(role, half, content) {
                        return Ok(hash);
                    }
                }
                structural
            }
            CmpType::Reject => {
                if incoming_down && fib.remove_interface(content, version, incoming) && !root {
                    if let Some(retry) = false_content_hash(role, half, content) {
                        debug!("{}: {} withdrawn, second guess {}", self.position, content, retry);
                        return Ok(retry);
                    }
                }
                structural
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ccdn_common::{ContentId, Error, NodeRole};

    fn host(subtree: u32, edge: u32, port: u32) -> Ipv4Addr {
        Ipv4Addr::from((10 << 24) | (subtree << 17) | (edge << 10) | port)
    }

    fn engine(role: NodeRole, subtree: u32, index: u32) -> RoutingEngine {
        RoutingEngine::new(
            NodePosition::new(role, subtree, index),
            4,
            NonZeroUsize::new(8).unwrap(),
            42,
            Arc::new(CcdnMetrics::new()),
        )
    }

    fn cmp(content: u64, kind: CmpType) -> CmpPacket {
        CmpPacket::new(ContentId(content), 0, kind)
    }

    fn route(e: &mut RoutingEngine, src: Ipv4Addr, dst: Ipv4Addr, packet: CmpPacket, incoming: InterfaceId) -> InterfaceId {
        let header = PacketHeader::udp(src, dst);
        e.route_input(&header, &packet.to_bytes(), incoming).unwrap()
    }

    #[test]
    fn test_host_has_no_fib() {
        let e = RoutingEngine::new(
            NodePosition::new(NodeRole::Host, 0, 0),
            1,
            NonZeroUsize::new(8).unwrap(),
            0,
            Arc::new(CcdnMetrics::new()),
        );
        assert!(e.fib().is_none());
        assert_eq!(e.route_output(host(1, 0, 0), host(0, 0, 0)).unwrap(), 1);
    }

    #[test]
    fn test_request_miss_escalates_by_hash() {
        let mut edge = engine(NodeRole::Edge, 1, 1);
        // Host 10.2.4.1 asks 10.0.4.1 for content 1; it came up port 2.
        let out = route(&mut edge, host(1, 1, 1), host(0, 1, 1), cmp(1, CmpType::Request), 2);

        assert_eq!(Some(out), content_hash(NodeRole::Edge, 2, ContentId(1)));
        assert_eq!(edge.metrics.hash_escalations.value(), 1);
        // Upward structural choices are not learned on a miss.
        assert!(edge.fib().unwrap().iter().all(|e| e.is_empty()));
    }

    #[test]
    fn test_request_towards_local_host_is_learned() {
        let mut edge = engine(NodeRole::Edge, 0, 1);
        let out = route(&mut edge, host(1, 1, 1), host(0, 1, 1), cmp(1, CmpType::Request), 3);

        assert_eq!(out, 2);
        let entry = edge.fib_mut().unwrap().lookup(ContentId(1), 0).unwrap();
        assert_eq!(entry.interfaces().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_request_at_root_goes_structural_and_is_recorded() {
        let mut core = engine(NodeRole::Core, 0, 0);
        let out = route(&mut core, host(1, 1, 1), host(0, 1, 1), cmp(1, CmpType::Request), 2);

        assert_eq!(out, 1);
        assert!(core.fib().unwrap().contains(ContentId(1)));
    }

    #[test]
    fn test_reply_teaches_and_hits_later_request() {
        let mut edge = engine(NodeRole::Edge, 1, 1);

        // Reply from local host on port 1 travels up by hash.
        let up = route(&mut edge, host(1, 1, 0), host(0, 0, 0), cmp(5, CmpType::Reply), 1);
        assert_eq!(Some(up), content_hash(NodeRole::Edge, 2, ContentId(5)));

        // A Request for 5 from the other local host now follows the FIB.
        let out = route(&mut edge, host(1, 1, 1), host(0, 0, 0), cmp(5, CmpType::Request), 2);
        assert_eq!(out, 1);
        assert_eq!(edge.metrics.fib_hits.value(), 1);
    }

    #[test]
    fn test_reply_from_above_is_structural() {
        let mut aggr = engine(NodeRole::Aggregation, 1, 0);
        let out = route(&mut aggr, host(0, 0, 0), host(1, 1, 1), cmp(5, CmpType::Reply), 3);

        assert_eq!(out, 2);
        assert!(aggr.fib().unwrap().is_empty());
    }

    #[test]
    fn test_reject_empties_entry_and_uses_second_guess() {
        let mut edge = engine(NodeRole::Edge, 1, 1);
        edge.fib_mut().unwrap().insert_interface(ContentId(1), 0, 1);

        let out = route(&mut edge, host(1, 1, 0), host(0, 0, 0), cmp(1, CmpType::Reject), 1);
        assert_eq!(Some(out), false_content_hash(NodeRole::Edge, 2, ContentId(1)));
    }

    #[test]
    fn test_reject_leaving_candidates_is_structural() {
        let mut edge = engine(NodeRole::Edge, 1, 1);
        let fib = edge.fib_mut().unwrap();
        fib.insert_interface(ContentId(1), 0, 1);
        fib.insert_interface(ContentId(1), 0, 2);

        let out = route(&mut edge, host(1, 1, 0), host(0, 0, 0), cmp(1, CmpType::Reject), 1);
        assert_eq!(out, 3);
        let entry = edge.fib_mut().unwrap().lookup(ContentId(1), 0).unwrap();
        assert_eq!(entry.interfaces().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_switch_without_upward_ports_routes_structurally() {
        let mut edge = RoutingEngine::new(
            NodePosition::new(NodeRole::Edge, 0, 0),
            1,
            NonZeroUsize::new(8).unwrap(),
            0,
            Arc::new(CcdnMetrics::new()),
        );
        let header = PacketHeader::udp(host(0, 0, 0), host(1, 0, 0));

        for kind in [CmpType::Request, CmpType::Reply, CmpType::FinishAck, CmpType::Reject] {
            let payload = cmp(1, kind).to_bytes();
            // Any answer is fine as long as no hashed port is invented.
            let _ = edge.route_input(&header, &payload, 1);
        }
        assert_eq!(edge.metrics.hash_escalations.value(), 0);
    }

    #[test]
    fn test_finish_is_structural() {
        let mut edge = engine(NodeRole::Edge, 1, 1);
        let out = route(&mut edge, host(1, 1, 0), host(1, 1, 1), cmp(1, CmpType::Finish), 1);
        assert_eq!(out, 2);
        assert!(edge.fib().unwrap().is_empty());
    }

    #[test]
    fn test_content_routing_disabled() {
        let mut edge = engine(NodeRole::Edge, 1, 1);
        edge.set_content_routing(false);
        let out = route(&mut edge, host(1, 1, 0), host(0, 0, 0), cmp(5, CmpType::Reply), 1);

        assert_eq!(out, 3);
        assert!(edge.fib().unwrap().is_empty());
    }

    #[test]
    fn test_garbage_payload_falls_back() {
        let mut edge = engine(NodeRole::Edge, 1, 1);
        let header = PacketHeader::udp(host(1, 1, 0), host(1, 1, 1));
        assert_eq!(edge.route_input(&header, &[1, 2, 3], 1).unwrap(), 2);
    }

    #[test]
    fn test_non_unicast_dropped() {
        let mut edge = engine(NodeRole::Edge, 1, 1);
        let header = PacketHeader::udp(host(1, 1, 0), Ipv4Addr::BROADCAST);
        let payload = cmp(1, CmpType::Request).to_bytes();
        assert!(matches!(
            edge.route_input(&header, &payload, 1),
            Err(Error::NoRoute(_))
        ));
    }
}
