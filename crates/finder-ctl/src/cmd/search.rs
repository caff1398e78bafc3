//! Resource search command.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, post_json_body};

#[derive(Serialize)]
struct SearchRequest<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    endpoints: Vec<String>,
}

pub async fn cmd_search(port: u16, name: &str, version: &str) -> Result<()> {
    let resp: SearchResponse = post_json_body(
        &format!("{}/search", base_url(port)),
        &SearchRequest { name, version },
    )
    .await?;

    if resp.endpoints.is_empty() {
        println!("No endpoints known yet for {}-{}.", name, version);
        println!("A search is in flight; ask again in a few seconds for remote results.");
        return Ok(());
    }

    println!("Endpoints offering {}-{} ({}):", name, version, resp.endpoints.len());
    for e in &resp.endpoints {
        println!("  {}", e);
    }
    Ok(())
}
