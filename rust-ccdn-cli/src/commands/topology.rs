//! Topology command implementation for ccdn CLI

use anyhow::{anyhow, Result};
use log::info;
use rust_ccdn_common::{HostId, NodeRole};
use rust_ccdn_sim::FatTree;
use serde::Serialize;

use crate::utils::print_header;

#[derive(Debug, Serialize)]
struct TreeReport {
    port: u32,
    core: usize,
    aggregation: usize,
    edge: usize,
    hosts: usize,
}

#[derive(Debug, Serialize)]
struct HostReport {
    host: HostId,
    address: String,
    subtree: u32,
    edge: u32,
    port: u32,
}

/// Print the shape of a fat tree, or the location of one host in it
pub fn describe(port: u32, host: Option<u32>, json: bool) -> Result<()> {
    let tree = FatTree::build(port)?;
    info!("Built fat tree with k={}", port);

    match host {
        Some(host) => describe_host(&tree, HostId(host), json),
        None => {
            let count = |role: NodeRole| {
                tree.nodes()
                    .iter()
                    .filter(|n| n.position.role == role)
                    .count()
            };
            let report = TreeReport {
                port,
                core: count(NodeRole::Core),
                aggregation: count(NodeRole::Aggregation),
                edge: count(NodeRole::Edge),
                hosts: tree.host_count(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_header(&format!("Fat tree k={}", port));
                println!("  Core switches:        {}", report.core);
                println!("  Aggregation switches: {}", report.aggregation);
                println!("  Edge switches:        {}", report.edge);
                println!("  Hosts:                {}", report.hosts);
            }
            Ok(())
        }
    }
}

fn describe_host(tree: &FatTree, host: HostId, json: bool) -> Result<()> {
    let address = tree
        .host_address(host)
        .ok_or_else(|| anyhow!("Host {} is not in a tree with {} hosts", host, tree.host_count()))?;
    let location = tree.host_location(host);
    let report = HostReport {
        host,
        address: address.to_string(),
        subtree: location.subtree,
        edge: location.edge,
        port: location.port,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Host {} at {} ({})", host, address, location);
    }
    Ok(())
}
