//! /search handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use finder_core::SearchCriteria;

use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub endpoints: Vec<String>,
}

pub async fn handle_search(
    State(state): State<ApiState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let name = req.name.trim();
    let version = req.version.trim();
    if name.is_empty() || version.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "name and version are required".to_string(),
        ));
    }

    let endpoints = state.finder.search(&SearchCriteria::new(name, version));
    Ok(Json(SearchResponse { endpoints }))
}
