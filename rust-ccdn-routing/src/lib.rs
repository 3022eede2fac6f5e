//! Routing for ccdn.
//!
//! Every node owns a [`RoutingEngine`]. Switches forward CMP datagrams by
//! content using their [`rust_ccdn_tables::ContentFib`] and fall back to the
//! fat tree's address-based routing for everything else.

pub mod engine;
pub mod hash;
pub mod structural;

pub use engine::RoutingEngine;
pub use hash::{content_hash, false_content_hash};
pub use structural::{is_downward, structural_route};
