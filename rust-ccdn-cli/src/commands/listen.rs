//! Listen command implementation for ccdn CLI

use anyhow::Result;
use log::info;
use rust_ccdn_common::metrics::CcdnMetrics;
use rust_ccdn_udp::{CmpSocket, HostResponder};
use std::sync::Arc;

use crate::utils::parse_content_spec;

/// Answer CMP packets for the held content
pub async fn listen(bind: String, hold: Vec<String>, count: Option<usize>) -> Result<()> {
    let mut responder = HostResponder::new();
    for spec in &hold {
        let (content, version) = parse_content_spec(spec)?;
        responder.hold(content, version);
        println!("Holding {} v{}", content, version);
    }

    let socket = CmpSocket::bind(&bind, Arc::new(CcdnMetrics::new())).await?;
    println!("Listening on {}", socket.local_addr());

    let handled = socket.serve(&mut responder, count).await?;
    info!("Handled {} packets", handled);

    let metrics = socket.metrics().snapshot();
    println!(
        "Handled {} packets: {} replies, {} rejects",
        handled, metrics.replies_sent, metrics.rejects_sent
    );

    Ok(())
}
