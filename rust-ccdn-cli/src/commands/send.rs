//! Request sending command implementation for ccdn CLI

use anyhow::{Context, Result};
use log::info;
use rust_ccdn_common::{metrics::CcdnMetrics, CmpPacket, CmpType, ContentId};
use rust_ccdn_udp::CmpSocket;
use std::{sync::Arc, time::Duration};

/// Send a Request and print the answer
pub async fn send_request(peer: String, content: String, version: u32, timeout_ms: u64) -> Result<()> {
    let content: ContentId = content.parse().context("Invalid content id")?;
    info!("Sending Request: peer={}, content={}, version={}", peer, content, version);

    let socket = CmpSocket::bind("0.0.0.0:0", Arc::new(CcdnMetrics::new())).await?;
    let request = CmpPacket::new(content, version, CmpType::Request);

    println!("Sending {} to {}", request, peer);
    match socket
        .request(request, peer.as_str(), Some(Duration::from_millis(timeout_ms)))
        .await?
    {
        Some((answer, from)) => {
            println!("{} answered: {}", from, answer);
        }
        None => {
            println!("Timeout after {}ms", timeout_ms);
        }
    }

    Ok(())
}
