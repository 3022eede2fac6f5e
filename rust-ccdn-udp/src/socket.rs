//! A UDP socket that speaks CMP.

use anyhow::{anyhow, Context, Result};
use bytes::BytesMut;
use log::{debug, info, trace, warn};
use rust_ccdn_common::{metrics::CcdnMetrics, CmpPacket, CmpType};
use std::{
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{net::UdpSocket, time::timeout};

use crate::{default_request_timeout, responder::HostResponder, MAX_DATAGRAM_SIZE};

#[derive(Debug)]
pub struct CmpSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
    metrics: Arc<CcdnMetrics>,
}

impl CmpSocket {
    /// Bind to `addr` (for example `0.0.0.0:2013`).
    pub async fn bind(addr: &str, metrics: Arc<CcdnMetrics>) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to bind CMP socket on {}", addr))?;
        let local_addr = socket.local_addr()?;
        info!("CMP socket bound to {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            metrics,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> &Arc<CcdnMetrics> {
        &self.metrics
    }

    /// Send one packet to `peer`.
    pub async fn send_to(&self, packet: &CmpPacket, peer: SocketAddr) -> Result<()> {
        let mut buf = BytesMut::new();
        packet.encode(&mut buf);
        self.socket
            .send_to(&buf, peer)
            .await
            .with_context(|| format!("Failed to send {} to {}", packet, peer))?;

        trace!("sent {} to {}", packet, peer);
        self.metrics.sent(packet.kind).increment();
        Ok(())
    }

    /// Wait for the next well-formed packet. Malformed datagrams are logged,
    /// counted as dropped and skipped.
    pub async fn recv_from(&self) -> Result<(CmpPacket, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, peer) = self
                .socket
                .recv_from(&mut buf)
                .await
                .context("Failed to receive CMP datagram")?;

            match CmpPacket::from_slice(&buf[..len]) {
                Ok(packet) => {
                    trace!("received {} from {}", packet, peer);
                    self.metrics.received(packet.kind).increment();
                    return Ok((packet, peer));
                }
                Err(e) => {
                    warn!("Dropping {} byte datagram from {}: {}", len, peer, e);
                    self.metrics.packets_dropped.increment();
                }
            }
        }
    }

    /// Send a Request to `peer` and wait for its Reply or Reject.
    ///
    /// Returns `Ok(None)` if nothing answers within `wait` (default
    /// [`crate::DEFAULT_REQUEST_TIMEOUT_MS`]).
    pub async fn request(
        &self,
        packet: CmpPacket,
        peer: impl ToSocketAddrs,
        wait: Option<Duration>,
    ) -> Result<Option<(CmpPacket, SocketAddr)>> {
        if packet.kind != CmpType::Request {
            return Err(anyhow!("{} is not a Request", packet));
        }
        let peer = peer
            .to_socket_addrs()
            .context("Invalid peer address")?
            .next()
            .ok_or_else(|| anyhow!("Peer address did not resolve"))?;

        let start = Instant::now();
        self.send_to(&packet, peer).await?;

        let answer = async {
            loop {
                let (reply, from) = self.recv_from().await?;
                let answers = reply.content == packet.content
                    && matches!(reply.kind, CmpType::Reply | CmpType::Reject);
                if answers {
                    return Ok::<_, anyhow::Error>((reply, from));
                }
                debug!("ignoring {} from {} while waiting for an answer", reply, from);
            }
        };

        match timeout(wait.unwrap_or_else(default_request_timeout), answer).await {
            Ok(result) => {
                let (reply, from) = result?;
                let rtt = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
                self.metrics.fetch_latency.observe(rtt);
                debug!("{} answered {} in {}µs", from, reply, rtt);
                Ok(Some((reply, from)))
            }
            Err(_) => {
                debug!("no answer from {} for {}", peer, packet);
                self.metrics.request_timeouts.increment();
                Ok(None)
            }
        }
    }

    /// Answer incoming packets with `responder` until `limit` packets have
    /// been handled (forever if `None`).
    pub async fn serve(&self, responder: &mut HostResponder, limit: Option<usize>) -> Result<usize> {
        let mut handled = 0;
        while limit.map_or(true, |limit| handled < limit) {
            let (packet, peer) = self.recv_from().await?;
            handled += 1;
            if let Some(answer) = responder.respond(&packet) {
                self.send_to(&answer, peer).await?;
            }
        }
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ccdn_common::ContentId;

    async fn bind() -> CmpSocket {
        CmpSocket::bind("127.0.0.1:0", Arc::new(CcdnMetrics::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_is_answered() {
        let server = bind().await;
        let client = bind().await;
        let server_addr = server.local_addr();

        let mut responder = HostResponder::new();
        responder.hold(ContentId(1), 2);

        let handle = tokio::spawn(async move {
            server.serve(&mut responder, Some(2)).await.unwrap();
            server
        });

        let (reply, from) = client
            .request(
                CmpPacket::new(ContentId(1), 2, CmpType::Request),
                server_addr,
                Some(Duration::from_secs(2)),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.kind, CmpType::Reply);
        assert_eq!(from, server_addr);

        let (reject, _) = client
            .request(
                CmpPacket::new(ContentId(9), 0, CmpType::Request),
                server_addr,
                Some(Duration::from_secs(2)),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reject.kind, CmpType::Reject);

        let server = handle.await.unwrap();
        assert_eq!(server.metrics().sent(CmpType::Reply).value(), 1);
        assert_eq!(server.metrics().sent(CmpType::Reject).value(), 1);
        assert_eq!(client.metrics().fetch_latency.count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_datagrams_are_skipped() {
        let server = bind().await;
        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        raw.send_to(b"short", server.local_addr()).await.unwrap();
        let packet = CmpPacket::new(ContentId(4), 0, CmpType::Finish);
        raw.send_to(&packet.to_bytes(), server.local_addr())
            .await
            .unwrap();

        let (received, _) = server.recv_from().await.unwrap();
        assert_eq!(received, packet);
        assert_eq!(server.metrics().packets_dropped.value(), 1);
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let client = bind().await;
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let answer = client
            .request(
                CmpPacket::new(ContentId(1), 0, CmpType::Request),
                silent.local_addr().unwrap(),
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap();
        assert!(answer.is_none());
        assert_eq!(client.metrics().request_timeouts.value(), 1);
        // Nothing was sent again.
        assert_eq!(client.metrics().retries.value(), 0);
        assert_eq!(client.metrics().sent(CmpType::Request).value(), 1);
    }

    #[tokio::test]
    async fn test_only_requests_are_sent_as_requests() {
        let client = bind().await;
        let result = client
            .request(
                CmpPacket::new(ContentId(1), 0, CmpType::Finish),
                client.local_addr(),
                None,
            )
            .await;
        assert!(result.is_err());
    }
}
