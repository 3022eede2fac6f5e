//! Common types shared between the forwarding tables, the routing engine
//! and the content coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::Error;

/// Interface identifier. Interfaces are numbered from 1; 0 is loopback.
pub type InterfaceId = usize;

/// Pseudo interface used for packets delivered on the same host.
pub const LOOPBACK_INTERFACE: InterfaceId = 0;

/// Content version number. Higher versions supersede lower ones.
pub type Version = u32;

/// Number of hex characters in the textual form of a content identifier.
pub const CONTENT_ID_HEX_LEN: usize = 16;

/// 64-bit content identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentId(pub u64);

impl ContentId {
    /// Returns the raw identifier.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for ContentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for ContentId {
    type Err = Error;

    /// Parses exactly 16 hex characters, big-endian.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != CONTENT_ID_HEX_LEN {
            return Err(Error::Config(format!(
                "content id must be {} hex characters, got {:?}",
                CONTENT_ID_HEX_LEN, s
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Config(format!("content id {:?} is not hexadecimal", s)));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| Error::Config(format!("invalid content id {:?}: {}", s, e)))
    }
}

/// Host identifier: index of a host in topology order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostId(pub u32);

impl HostId {
    /// Index into per-host tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a node in the layered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeRole {
    /// Core switch (root tier).
    Core = 0,
    /// Aggregation switch.
    Aggregation = 1,
    /// Edge (top-of-rack) switch.
    Edge = 2,
    /// End host.
    Host = 3,
}

impl NodeRole {
    /// True for the root tier, which never escalates upward.
    pub fn is_root_tier(self) -> bool {
        self == NodeRole::Core
    }

    /// True for switches (every role except hosts).
    pub fn is_switch(self) -> bool {
        self != NodeRole::Host
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Core => "core",
            NodeRole::Aggregation => "aggr",
            NodeRole::Edge => "edge",
            NodeRole::Host => "host",
        };
        f.write_str(name)
    }
}

/// Static structural position of a node, handed out by the topology builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePosition {
    /// Role of the node.
    pub role: NodeRole,
    /// Subtree (pod) the node belongs to. Always 0 for core switches.
    pub subtree: u32,
    /// Index of the node within its subtree and role.
    pub index: u32,
}

impl NodePosition {
    pub fn new(role: NodeRole, subtree: u32, index: u32) -> Self {
        Self { role, subtree, index }
    }
}

impl fmt::Display for NodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}.{}]", self.role, self.subtree, self.index)
    }
}

/// Transport protocol of a routed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Datagram traffic. Carries CMP packets.
    Udp,
    /// Reliable byte-stream traffic (bulk transfers).
    Tcp,
}

/// Addressing information of a packet being forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// The source address.
    pub src: Ipv4Addr,
    /// The destination address.
    pub dst: Ipv4Addr,
    /// The transport protocol.
    pub protocol: Protocol,
}

impl PacketHeader {
    /// Create a new UDP header.
    pub fn udp(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self {
            src,
            dst,
            protocol: Protocol::Udp,
        }
    }

    /// True if the destination is a multicast or broadcast address.
    pub fn is_non_unicast(&self) -> bool {
        self.dst.is_multicast() || self.dst.is_broadcast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_parse() {
        let id: ContentId = "0000000000000001".parse().unwrap();
        assert_eq!(id, ContentId(1));

        let id: ContentId = "00000000DEADbeef".parse().unwrap();
        assert_eq!(id.value(), 0xdead_beef);
        assert_eq!(id.to_string(), "00000000deadbeef");
    }

    #[test]
    fn test_content_id_rejects_bad_input() {
        assert!("1".parse::<ContentId>().is_err());
        assert!("00000000000000001".parse::<ContentId>().is_err());
        assert!("000000000000000g".parse::<ContentId>().is_err());
        assert!("+000000000000001".parse::<ContentId>().is_err());
    }

    #[test]
    fn test_root_tier() {
        assert!(NodeRole::Core.is_root_tier());
        assert!(!NodeRole::Edge.is_root_tier());
        assert!(!NodeRole::Host.is_switch());
    }

    #[test]
    fn test_non_unicast() {
        let src = Ipv4Addr::new(10, 0, 0, 1);
        assert!(PacketHeader::udp(src, Ipv4Addr::BROADCAST).is_non_unicast());
        assert!(PacketHeader::udp(src, Ipv4Addr::new(224, 0, 0, 1)).is_non_unicast());
        assert!(!PacketHeader::udp(src, Ipv4Addr::new(10, 0, 4, 1)).is_non_unicast());
    }
}
