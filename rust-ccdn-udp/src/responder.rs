//! Host-side answers to CMP packets.

use log::debug;
use rust_ccdn_common::{CmpPacket, CmpType, ContentId, Version};
use std::collections::HashMap;

/// What a host holds, and how it answers peers about it.
///
/// A Request is answered with a Reply when a copy at least as new as the
/// requested version is held, and with a Reject otherwise. A Finish is
/// acknowledged and the delivered copy is recorded.
#[derive(Debug, Default, Clone)]
pub struct HostResponder {
    held: HashMap<ContentId, Version>,
}

impl HostResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a copy of `content`. An older copy is replaced; a newer one kept.
    pub fn hold(&mut self, content: ContentId, version: Version) {
        let held = self.held.entry(content).or_insert(version);
        if *held < version {
            *held = version;
        }
    }

    pub fn holds(&self, content: ContentId, version: Version) -> bool {
        self.held.get(&content).map_or(false, |held| *held >= version)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// The packet to send back, if any.
    pub fn respond(&mut self, packet: &CmpPacket) -> Option<CmpPacket> {
        let CmpPacket {
            content, version, ..
        } = *packet;
        match packet.kind {
            CmpType::Request if self.holds(content, version) => {
                Some(CmpPacket::new(content, version, CmpType::Reply))
            }
            CmpType::Request => Some(CmpPacket::new(content, version, CmpType::Reject)),
            CmpType::Finish => {
                self.hold(content, version);
                Some(CmpPacket::new(content, version, CmpType::FinishAck))
            }
            CmpType::Reply | CmpType::Reject | CmpType::FinishAck => {
                debug!("nothing to answer for {}", packet);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_answers() {
        let mut host = HostResponder::new();
        host.hold(ContentId(1), 3);

        let reply = host.respond(&CmpPacket::new(ContentId(1), 2, CmpType::Request));
        assert_eq!(reply.map(|p| p.kind), Some(CmpType::Reply));

        let reject = host.respond(&CmpPacket::new(ContentId(1), 4, CmpType::Request));
        assert_eq!(reject.map(|p| p.kind), Some(CmpType::Reject));

        assert!(host
            .respond(&CmpPacket::new(ContentId(1), 3, CmpType::Reply))
            .is_none());
    }

    #[test]
    fn test_finish_stores_copy() {
        let mut host = HostResponder::new();
        let ack = host.respond(&CmpPacket::new(ContentId(5), 1, CmpType::Finish));
        assert_eq!(ack, Some(CmpPacket::new(ContentId(5), 1, CmpType::FinishAck)));
        assert!(host.holds(ContentId(5), 1));

        host.hold(ContentId(5), 0);
        assert!(host.holds(ContentId(5), 1));
        assert_eq!(host.len(), 1);
    }
}
