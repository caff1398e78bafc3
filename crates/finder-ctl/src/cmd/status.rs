//! Daemon status, resources, neighbors, shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    node_id: String,
    forwarding_entries: usize,
    pending_searches: usize,
    cached_endpoints: usize,
    neighbors: Vec<QueueDepth>,
}

#[derive(Deserialize)]
struct QueueDepth {
    id: String,
    queued: usize,
    capacity: usize,
}

#[derive(Deserialize)]
struct ResourcesResponse {
    endpoints: Vec<EndpointInfo>,
}

#[derive(Deserialize)]
struct EndpointInfo {
    endpoint: String,
    resources: Vec<String>,
    last_detected_ms: u64,
    consecutive_failures: u32,
}

#[derive(Deserialize)]
struct NeighborsResponse {
    neighbors: Vec<NeighborInfo>,
}

#[derive(Deserialize)]
struct NeighborInfo {
    id: String,
    endpoint: String,
    queued: usize,
    capacity: usize,
    delivered: u64,
    dropped: u64,
    failed: u64,
}

#[derive(Deserialize)]
struct ShutdownResponse {
    message: String,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Finder Node {}", resp.node_id);
    println!("═══════════════════════════════════════");
    println!("  Forwarding entries : {}", resp.forwarding_entries);
    println!("  Pending searches   : {}", resp.pending_searches);
    println!("  Cached endpoints   : {}", resp.cached_endpoints);

    if resp.neighbors.is_empty() {
        println!("\n  No neighbors configured.");
    } else {
        println!("\n  Output queues:");
        for n in &resp.neighbors {
            println!("    {:<16} {:>4} / {}", n.id, n.queued, n.capacity);
        }
    }

    Ok(())
}

pub async fn cmd_resources(port: u16) -> Result<()> {
    let resp: ResourcesResponse = get_json(&format!("{}/resources", base_url(port))).await?;

    if resp.endpoints.is_empty() {
        println!("No compute endpoints cached.");
        return Ok(());
    }

    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    for e in &resp.endpoints {
        println!("  ┌─ {}", e.endpoint);
        println!("  │  resources : {}", e.resources.join(", "));
        println!("  │  failures  : {}", e.consecutive_failures);
        println!(
            "  └─ detected  : {}s ago",
            now_ms.saturating_sub(e.last_detected_ms) / 1000
        );
    }

    Ok(())
}

pub async fn cmd_neighbors(port: u16) -> Result<()> {
    let resp: NeighborsResponse = get_json(&format!("{}/neighbors", base_url(port))).await?;

    if resp.neighbors.is_empty() {
        println!("No neighbors configured.");
        return Ok(());
    }

    for n in &resp.neighbors {
        println!("  ┌─ {}", n.id);
        println!("  │  endpoint  : {}", n.endpoint);
        println!("  │  queued    : {} / {}", n.queued, n.capacity);
        println!("  │  delivered : {}", n.delivered);
        println!("  │  dropped   : {}", n.dropped);
        println!("  └─ failed    : {}", n.failed);
    }

    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
