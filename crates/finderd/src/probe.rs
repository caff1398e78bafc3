//! HTTP resource probe.
//!
//! A compute endpoint lists its enabled resources at `GET {endpoint}/resources`
//! as a JSON array of "Name-Version" strings.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use finder_core::ResourceDescriptor;
use finder_services::{now_ms, Detection, ResourceProbe, TransportError};

pub struct HttpResourceProbe {
    client: reqwest::Client,
}

impl HttpResourceProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// Parse advertised identifiers. Identifiers without a version part still
/// count, with an empty version.
pub fn parse_identifiers(endpoint: &str, identifiers: &[String]) -> HashSet<ResourceDescriptor> {
    let parsed: HashSet<_> = identifiers
        .iter()
        .map(|id| ResourceDescriptor::parse_lossy(id))
        .collect();
    tracing::debug!(endpoint, advertised = identifiers.len(), distinct = parsed.len(), "resources parsed");
    parsed
}

#[async_trait]
impl ResourceProbe for HttpResourceProbe {
    async fn try_get_resources(&self, endpoint: &str) -> Result<Detection, TransportError> {
        let base = endpoint.trim_end_matches('/');
        let url = format!("{base}/resources");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let identifiers: Vec<String> = resp.json().await.map_err(|e| TransportError::SendFailed {
            endpoint: endpoint.to_string(),
            reason: format!("invalid resource list: {e}"),
        })?;

        Ok(Detection {
            resources: parse_identifiers(endpoint, &identifiers),
            detected_at_ms: now_ms(),
        })
    }
}
