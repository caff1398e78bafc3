//! /query and /reply handlers — messages from neighbor nodes.
//!
//! Accepted messages are handled in the background; the response only says
//! whether the sender is a configured neighbor.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use finder_core::{QueryEnvelope, ReplyEnvelope};

use super::ApiState;

pub async fn handle_query(
    State(state): State<ApiState>,
    Json(env): Json<QueryEnvelope>,
) -> StatusCode {
    if state.gateway.query(env.from, env.query) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::FORBIDDEN
    }
}

pub async fn handle_reply(
    State(state): State<ApiState>,
    Json(env): Json<ReplyEnvelope>,
) -> StatusCode {
    if state.gateway.reply(env.from, env.reply) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::FORBIDDEN
    }
}
