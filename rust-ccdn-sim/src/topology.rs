//! Fat-tree topology builder.
//!
//! A tree of parameter `port = k` has `2N` subtrees (`N = k/2`), each with
//! `N` edge and `N` aggregation switches, `N²` core switches and `2N³` hosts.
//!
//! Interface numbering:
//!
//! ```text
//! edge  (j, i):  1..=N  -> host (j, i, m)       N+1..=2N -> aggr (j, m)
//! aggr  (j, i):  1..=N  -> edge (j, m)          N+1..=2N -> core i*N + m
//! core  c:       j+1    -> aggr (j, c / N)
//! host:          1      -> its edge switch
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use rust_ccdn_common::{
    config::MAX_PORT, Error, HostId, InterfaceId, NodePosition, NodeRole, Result,
};

/// Index of a node in the topology.
pub type NodeId = usize;

/// Far end of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub peer: NodeId,
    pub peer_interface: InterfaceId,
}

#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub position: NodePosition,
    pub address: Ipv4Addr,
    /// `interfaces[k]` is interface `k + 1`
    pub interfaces: Vec<Link>,
}

impl NodeInfo {
    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    pub fn link(&self, iface: InterfaceId) -> Option<Link> {
        iface.checked_sub(1).and_then(|i| self.interfaces.get(i)).copied()
    }
}

/// Location of a host: subtree, edge switch, port on the edge switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostLocation {
    pub subtree: u32,
    pub edge: u32,
    pub port: u32,
}

impl HostLocation {
    /// Location of `host` in a tree with `half` downward ports per switch.
    pub fn of(host: HostId, half: u32) -> Self {
        let h = host.0;
        Self {
            subtree: h / (half * half),
            edge: (h / half) % half,
            port: h % half,
        }
    }

    /// Address of the host at this location.
    pub fn address(&self) -> Ipv4Addr {
        Ipv4Addr::from(host_address(self.subtree, self.edge, self.port))
    }

    pub fn host_id(&self, half: u32) -> HostId {
        HostId(self.port + self.edge * half + self.subtree * half * half)
    }

    /// Links between two hosts: 0 for the same host, 2 under the same edge
    /// switch, 4 in the same subtree, 6 across the core.
    pub fn distance(&self, other: &HostLocation) -> u32 {
        if self.subtree != other.subtree {
            6
        } else if self.edge != other.edge {
            4
        } else if self.port != other.port {
            2
        } else {
            0
        }
    }
}

impl fmt::Display for HostLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.subtree, self.edge, self.port)
    }
}

fn host_address(subtree: u32, edge: u32, port: u32) -> u32 {
    (((((10 << 7) + subtree) << 7) + edge) << 10) + port
}

fn pod_switch_address(subtree: u32, index: u32, tier: u32) -> u32 {
    (((((((10 << 7) + subtree) << 7) + index) << 2) + tier) << 8)
}

fn core_address(group: u32, member: u32) -> u32 {
    ((((((10 << 7) << 3) + 0x5) << 6) + member) << 8) + group
}

#[derive(Debug, Clone)]
pub struct FatTree {
    port: u32,
    half: u32,
    nodes: Vec<NodeInfo>,
    first_host: NodeId,
}

impl FatTree {
    /// Build the tree for switches with `port` interfaces.
    pub fn build(port: u32) -> Result<Self> {
        if port < 2 || port > MAX_PORT || port % 2 != 0 {
            return Err(Error::Topology(format!(
                "fat tree needs an even port count between 2 and {}, got {}",
                MAX_PORT, port
            )));
        }

        let n = port / 2;
        let nu = n as usize;
        let subtrees = 2 * nu;
        let pod_switches = subtrees * 2 * nu;
        let cores = nu * nu;
        let first_core = pod_switches;
        let first_host = pod_switches + cores;
        let hosts = subtrees * nu * nu;

        let edge = |j: usize, i: usize| j * 2 * nu + i;
        let aggr = |j: usize, i: usize| j * 2 * nu + nu + i;
        let core = |c: usize| first_core + c;
        let host = |j: usize, i: usize, m: usize| first_host + j * nu * nu + i * nu + m;
        let link = |peer: NodeId, peer_interface: InterfaceId| Link {
            peer,
            peer_interface,
        };

        let mut nodes = Vec::with_capacity(first_host + hosts);

        for j in 0..subtrees {
            for i in 0..nu {
                let mut interfaces = Vec::with_capacity(2 * nu);
                interfaces.extend((0..nu).map(|m| link(host(j, i, m), 1)));
                interfaces.extend((0..nu).map(|m| link(aggr(j, m), i + 1)));
                nodes.push(NodeInfo {
                    position: NodePosition::new(NodeRole::Edge, j as u32, i as u32),
                    address: Ipv4Addr::from(pod_switch_address(j as u32, i as u32, 2)),
                    interfaces,
                });
            }
            for i in 0..nu {
                let mut interfaces = Vec::with_capacity(2 * nu);
                interfaces.extend((0..nu).map(|m| link(edge(j, m), nu + 1 + i)));
                interfaces.extend((0..nu).map(|m| link(core(i * nu + m), j + 1)));
                nodes.push(NodeInfo {
                    position: NodePosition::new(NodeRole::Aggregation, j as u32, i as u32),
                    address: Ipv4Addr::from(pod_switch_address(j as u32, i as u32, 1)),
                    interfaces,
                });
            }
        }

        for c in 0..cores {
            let (group, member) = (c / nu, c % nu);
            let interfaces = (0..subtrees)
                .map(|j| link(aggr(j, group), nu + 1 + member))
                .collect();
            nodes.push(NodeInfo {
                position: NodePosition::new(NodeRole::Core, 0, c as u32),
                address: Ipv4Addr::from(core_address(group as u32, member as u32)),
                interfaces,
            });
        }

        for j in 0..subtrees {
            for i in 0..nu {
                for m in 0..nu {
                    nodes.push(NodeInfo {
                        position: NodePosition::new(NodeRole::Host, j as u32, (i * nu + m) as u32),
                        address: Ipv4Addr::from(host_address(j as u32, i as u32, m as u32)),
                        interfaces: vec![link(edge(j, i), m + 1)],
                    });
                }
            }
        }

        Ok(Self {
            port,
            half: n,
            nodes,
            first_host,
        })
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    /// Downward ports per switch (`N`).
    pub fn half(&self) -> u32 {
        self.half
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }

    pub fn host_count(&self) -> usize {
        self.nodes.len() - self.first_host
    }

    pub fn switch_count(&self) -> usize {
        self.first_host
    }

    /// Node id of a host.
    pub fn host_node(&self, host: HostId) -> Option<NodeId> {
        (host.index() < self.host_count()).then(|| self.first_host + host.index())
    }

    /// Host id of a node, if it is a host.
    pub fn node_host(&self, node: NodeId) -> Option<HostId> {
        (node >= self.first_host && node < self.nodes.len())
            .then(|| HostId((node - self.first_host) as u32))
    }

    pub fn host_location(&self, host: HostId) -> HostLocation {
        HostLocation::of(host, self.half)
    }

    pub fn host_address(&self, host: HostId) -> Option<Ipv4Addr> {
        self.host_node(host).map(|node| self.nodes[node].address)
    }

    /// Host owning `addr`.
    pub fn host_by_address(&self, addr: Ipv4Addr) -> Option<HostId> {
        let a = u32::from(addr);
        let location = HostLocation {
            subtree: (a >> 17) % 0x80,
            edge: (a >> 10) % 0x80,
            port: a % 0x100,
        };
        if location.subtree >= 2 * self.half || location.edge >= self.half || location.port >= self.half {
            return None;
        }
        let host = location.host_id(self.half);
        (self.host_address(host) == Some(addr)).then_some(host)
    }
}
