//! CMP over UDP for ccdn.
//!
//! The simulator moves CMP packets between in-process routing engines. This
//! crate puts the same 16-byte records on real UDP sockets so a host can ask
//! a peer for content and a peer can answer, using the well-known CMP port.

use std::time::Duration;

mod responder;
mod socket;

pub use responder::HostResponder;
pub use socket::CmpSocket;

/// Default address a listener binds to
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:2013";

/// Largest datagram a socket will read
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Default time to wait for an answer to a Request (in milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 500;

pub(crate) fn default_request_timeout() -> Duration {
    Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
}
