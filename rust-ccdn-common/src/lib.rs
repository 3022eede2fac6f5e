//! Common types and utilities for content-centric data-center networking (ccdn).
//!
//! This crate provides the identifiers, wire formats and ambient plumbing
//! shared by the forwarding tables, the routing engine, the simulator and
//! the command-line tools.

pub mod cmp;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

/// Reexport of common types
pub use cmp::{CmpPacket, CmpType};
pub use crate::config::SimulationConfig;
pub use error::Error;
pub use types::{ContentId, HostId, InterfaceId, NodePosition, NodeRole, Version};
pub type Result<T> = std::result::Result<T, Error>;
