//! Deterministic upward port choice for content that misses the FIB.

use rust_ccdn_common::{ContentId, InterfaceId, NodeRole};

/// Upward interface a node tries first for `content`.
///
/// `half` is the number of downward interfaces. None for roles without an
/// upward choice and for nodes with no upward interfaces.
pub fn content_hash(role: NodeRole, half: usize, content: ContentId) -> Option<InterfaceId> {
    if half == 0 {
        return None;
    }
    let c = content.value();
    let h = half as u64;
    let offset = match role {
        NodeRole::Edge => c % h,
        NodeRole::Aggregation => (c / h) % h,
        NodeRole::Core | NodeRole::Host => return None,
    };
    Some(offset as InterfaceId + half + 1)
}

/// Upward interface tried after the first guess was rejected.
pub fn false_content_hash(role: NodeRole, half: usize, content: ContentId) -> Option<InterfaceId> {
    content_hash(role, half, content).map(|first| first % half + half + 1)
}
