//! CMP (content management protocol) packet encoding and decoding.
//!
//! Every CMP packet is a fixed-size 16-byte record, big-endian:
//!
//! ```text
//! | content: u64 | version: u32 | type: u8 | reserved: 3 bytes (zero) |
//! ```

use crate::error::Error;
use crate::types::{ContentId, Version};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/* ---------------------------------------------------------------- *
 * Wire constants
 * ---------------------------------------------------------------- */

/// Encoded size of a CMP packet.
pub const CMP_PACKET_LEN: usize = 16;

/// Well-known datagram port for CMP traffic.
pub const CMP_PORT: u16 = 2013;

/// Well-known stream port for bulk content transfers.
pub const DATA_PORT: u16 = 2014;

const RESERVED_LEN: usize = 3;

/* ---------------------------------------------------------------- *
 * Packet type
 * ---------------------------------------------------------------- */

/// CMP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CmpType {
    /// Bulk transfer finished; sent by the holder to the requester.
    Finish = 0,
    /// Ask a host for a content.
    Request = 1,
    /// The host has the content and starts a transfer.
    Reply = 2,
    /// Requester acknowledges a finished transfer.
    FinishAck = 3,
    /// The host does not have the content.
    Reject = 4,
}

impl CmpType {
    /// All types in wire order.
    pub const ALL: [CmpType; 5] = [
        CmpType::Finish,
        CmpType::Request,
        CmpType::Reply,
        CmpType::FinishAck,
        CmpType::Reject,
    ];
}

impl TryFrom<u8> for CmpType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CmpType::Finish),
            1 => Ok(CmpType::Request),
            2 => Ok(CmpType::Reply),
            3 => Ok(CmpType::FinishAck),
            4 => Ok(CmpType::Reject),
            other => Err(Error::Cmp(format!("unknown CMP packet type {}", other))),
        }
    }
}

impl fmt::Display for CmpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CmpType::Finish => "finish",
            CmpType::Request => "request",
            CmpType::Reply => "reply",
            CmpType::FinishAck => "finish-ack",
            CmpType::Reject => "reject",
        };
        f.write_str(name)
    }
}

/* ---------------------------------------------------------------- *
 * Packet
 * ---------------------------------------------------------------- */

/// A CMP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmpPacket {
    pub content: ContentId,
    pub version: Version,
    pub kind: CmpType,
}

impl CmpPacket {
    pub fn new(content: ContentId, version: Version, kind: CmpType) -> Self {
        Self {
            content,
            version,
            kind,
        }
    }

    /// Encode this packet into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(CMP_PACKET_LEN);
        buf.put_u64(self.content.value());
        buf.put_u32(self.version);
        buf.put_u8(self.kind as u8);
        buf.put_bytes(0, RESERVED_LEN);
    }

    /// Encode this packet into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(CMP_PACKET_LEN);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a single packet from `buf`, consuming [`CMP_PACKET_LEN`] bytes.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < CMP_PACKET_LEN {
            return Err(Error::Cmp(format!(
                "buffer underflow: CMP packet requires {} bytes but only {} available",
                CMP_PACKET_LEN,
                buf.remaining()
            )));
        }

        let content = ContentId(buf.get_u64());
        let version = buf.get_u32();
        let kind = CmpType::try_from(buf.get_u8())?;
        buf.advance(RESERVED_LEN);

        Ok(Self {
            content,
            version,
            kind,
        })
    }

    /// Decode a packet from a byte slice.
    pub fn from_slice(mut bytes: &[u8]) -> Result<Self, Error> {
        Self::decode(&mut bytes)
    }
}

impl fmt::Display for CmpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} v{}", self.kind, self.content, self.version)
    }
}
