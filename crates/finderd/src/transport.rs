//! HTTP neighbor transport.
//!
//! A neighbor's endpoint is the base URI of its API. Queries and replies
//! are posted as JSON envelopes to `{endpoint}/api/query` and
//! `{endpoint}/api/reply`; anything but a 2xx answer counts as a failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use finder_core::{NodeId, QueryEnvelope, QueryMessage, ReplyEnvelope, ReplyMessage};
use finder_services::{NeighborChannel, NeighborTransport, TransportError};

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NeighborTransport for HttpTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn NeighborChannel>, TransportError> {
        // Connections are pooled by the client; a channel only pins the base URI.
        Ok(Box::new(HttpChannel {
            client: self.client.clone(),
            base: endpoint.trim_end_matches('/').to_string(),
        }))
    }
}

struct HttpChannel {
    client: reqwest::Client,
    base: String,
}

impl HttpChannel {
    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), TransportError> {
        let url = format!("{}/api/{}", self.base, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed {
                endpoint: self.base.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected {
                endpoint: self.base.clone(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl NeighborChannel for HttpChannel {
    async fn send_query(&mut self, from: &NodeId, query: &QueryMessage) -> Result<(), TransportError> {
        let env = QueryEnvelope {
            from: from.clone(),
            query: query.clone(),
        };
        self.post("query", &env).await
    }

    async fn send_reply(&mut self, from: &NodeId, reply: &ReplyMessage) -> Result<(), TransportError> {
        let env = ReplyEnvelope {
            from: from.clone(),
            reply: reply.clone(),
        };
        self.post("reply", &env).await
    }
}
