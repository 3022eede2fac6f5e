//! Content-centric forwarding for fat-tree data-center networks.
//!
//! This crate re-exports the workspace members:
//!
//! - [`common`]: identifiers, the CMP wire codec, configuration, errors, metrics
//! - [`tables`]: the content FIB and host content cache
//! - [`routing`]: structural routing and the per-node content routing engine
//! - [`sim`]: the fat-tree simulator and its content coordinator
//! - [`udp`]: CMP over UDP sockets

pub use rust_ccdn_common as common;
pub use rust_ccdn_routing as routing;
pub use rust_ccdn_sim as sim;
pub use rust_ccdn_tables as tables;
pub use rust_ccdn_udp as udp;

pub use rust_ccdn_common::{CmpPacket, CmpType, ContentId, Error, HostId, Result, SimulationConfig, Version};
pub use rust_ccdn_routing::RoutingEngine;
pub use rust_ccdn_sim::{AuditLog, RunSummary, Simulation};
pub use rust_ccdn_tables::{ContentCache, ContentFib};
