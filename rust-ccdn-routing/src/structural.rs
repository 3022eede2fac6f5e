//! Address-based routing in the fat tree.
//!
//! Host addresses encode their location as `10.<subtree:7><edge:7><0:2><port:8>`
//! so each tier can pick an output port from a few bit operations. Interfaces
//! `1..=N/2` face down the tree, `N/2+1..=N` face up.

use std::net::Ipv4Addr;

use rust_ccdn_common::{Error, InterfaceId, NodePosition, NodeRole, Result};

/// Subtree (pod) field of a host address.
pub fn address_subtree(addr: u32) -> u32 {
    (addr >> 17) & 0x7f
}

/// True if `iface` faces down the tree on a node with `interface_count` ports.
pub fn is_downward(iface: InterfaceId, interface_count: usize) -> bool {
    iface <= interface_count / 2
}

/// Output interface for a packet from `src` to `dst` at `position`.
pub fn structural_route(
    position: NodePosition,
    interface_count: usize,
    dst: Ipv4Addr,
    src: Ipv4Addr,
) -> Result<InterfaceId> {
    if dst.is_multicast() || dst.is_broadcast() {
        return Err(Error::NoRoute(format!("non-unicast destination {}", dst)));
    }

    let d = u32::from(dst);
    let s = u32::from(src);
    let half = (interface_count / 2) as u64;

    let iface = match position.role {
        NodeRole::Core => address_subtree(d) as u64 + 1,
        NodeRole::Aggregation => {
            if address_subtree(d) == position.subtree {
                ((d >> 10) % 0x40) as u64 + 1
            } else {
                half + 1 + (s % 0x100) as u64
            }
        }
        NodeRole::Edge => {
            if (d >> 10) & 0x3fbf == (position.subtree << 7) + position.index {
                (d % 0x100) as u64 + 1
            } else {
                half + 1 + (d % 0x100) as u64
            }
        }
        NodeRole::Host => 1,
    };

    if iface == 0 || iface > interface_count as u64 {
        return Err(Error::NoRoute(format!(
            "{} has no interface {} towards {}",
            position, iface, dst
        )));
    }
    Ok(iface as InterfaceId)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(subtree: u32, edge: u32, port: u32) -> Ipv4Addr {
        Ipv4Addr::from((10 << 24) | (subtree << 17) | (edge << 10) | port)
    }

    #[test]
    fn test_address_layout() {
        assert_eq!(host(1, 1, 1), Ipv4Addr::new(10, 2, 4, 1));
        assert_eq!(address_subtree(u32::from(host(3, 0, 1))), 3);
    }

    #[test]
    fn test_core_goes_to_subtree() {
        let core = NodePosition::new(NodeRole::Core, 0, 2);
        assert_eq!(structural_route(core, 4, host(0, 1, 1), host(3, 0, 0)).unwrap(), 1);
        assert_eq!(structural_route(core, 4, host(3, 0, 0), host(0, 1, 1)).unwrap(), 4);
    }

    #[test]
    fn test_aggregation() {
        let aggr = NodePosition::new(NodeRole::Aggregation, 1, 0);
        // Inside the subtree: down to the edge switch.
        assert_eq!(structural_route(aggr, 4, host(1, 1, 0), host(0, 0, 1)).unwrap(), 2);
        // Elsewhere: up, spread by the source port.
        assert_eq!(structural_route(aggr, 4, host(0, 0, 0), host(1, 1, 1)).unwrap(), 4);
        assert_eq!(structural_route(aggr, 4, host(0, 0, 0), host(1, 1, 0)).unwrap(), 3);
    }

    #[test]
    fn test_edge() {
        let edge = NodePosition::new(NodeRole::Edge, 1, 1);
        assert_eq!(structural_route(edge, 4, host(1, 1, 0), host(0, 0, 0)).unwrap(), 1);
        assert_eq!(structural_route(edge, 4, host(1, 1, 1), host(0, 0, 0)).unwrap(), 2);
        // Not below this edge: up, spread by the destination port.
        assert_eq!(structural_route(edge, 4, host(0, 1, 1), host(1, 1, 1)).unwrap(), 4);
    }

    #[test]
    fn test_host() {
        let h = NodePosition::new(NodeRole::Host, 0, 0);
        assert_eq!(structural_route(h, 1, host(1, 0, 0), host(0, 0, 0)).unwrap(), 1);
    }

    #[test]
    fn test_no_route() {
        let edge = NodePosition::new(NodeRole::Edge, 0, 0);
        let src = host(0, 0, 0);
        assert!(matches!(
            structural_route(edge, 4, Ipv4Addr::BROADCAST, src),
            Err(Error::NoRoute(_))
        ));
        assert!(structural_route(edge, 4, Ipv4Addr::new(239, 0, 0, 1), src).is_err());
        // Port 9 does not exist on a 4-port edge.
        assert!(structural_route(edge, 4, host(0, 0, 9), src).is_err());
    }

    #[test]
    fn test_downward() {
        assert!(is_downward(1, 4));
        assert!(is_downward(2, 4));
        assert!(!is_downward(3, 4));
    }
}
