//! /status, /resources, /neighbors, /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use finder_services::NeighborStatus;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub node_id: String,
    pub forwarding_entries: usize,
    pub pending_searches: usize,
    pub cached_endpoints: usize,
    pub neighbors: Vec<QueueDepth>,
}

#[derive(Serialize)]
pub struct QueueDepth {
    pub id: String,
    pub queued: usize,
    pub capacity: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let neighbors = state
        .handler
        .neighbors()
        .statuses()
        .into_iter()
        .map(|n| QueueDepth {
            id: n.id.to_string(),
            queued: n.queued,
            capacity: n.capacity,
        })
        .collect();

    Json(StatusResponse {
        node_id: state.node_id.to_string(),
        forwarding_entries: state.handler.forwarding().len(),
        pending_searches: state.handler.searches().len(),
        cached_endpoints: state.handler.resources().len(),
        neighbors,
    })
}

// ── /resources ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ResourcesResponse {
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub endpoint: String,
    /// "Name-Version" identifiers, sorted.
    pub resources: Vec<String>,
    pub last_detected_ms: u64,
    pub consecutive_failures: u32,
}

pub async fn handle_resources(State(state): State<ApiState>) -> Json<ResourcesResponse> {
    let endpoints = state
        .handler
        .resources()
        .snapshot()
        .into_iter()
        .map(|(endpoint, entry)| {
            let mut resources: Vec<String> =
                entry.resources.iter().map(|r| r.to_string()).collect();
            resources.sort();
            EndpointInfo {
                endpoint,
                resources,
                last_detected_ms: entry.last_detected_ms,
                consecutive_failures: entry.consecutive_failures,
            }
        })
        .collect();

    Json(ResourcesResponse { endpoints })
}

// ── /neighbors ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct NeighborsResponse {
    pub neighbors: Vec<NeighborStatus>,
}

pub async fn handle_neighbors(State(state): State<ApiState>) -> Json<NeighborsResponse> {
    Json(NeighborsResponse {
        neighbors: state.handler.neighbors().statuses(),
    })
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());

    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
