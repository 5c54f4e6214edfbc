//! Upstash Redis cache sink over the HTTP REST API.
//!
//! Commands are sent as a JSON array to the database URL with a bearer token:
//! `["SET", key, value, "EX", ttl]`. Upstash answers `{"result": ...}` on
//! success and `{"error": "..."}` otherwise.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{CacheSink, CACHE_TTL};
use crate::error::SinkError;
use crate::event::WebhookEvent;

#[derive(Debug, Deserialize)]
struct UpstashResponse {
    #[serde(default)]
    error: Option<String>,
}

/// REST-backed cache sink sharing the process-wide HTTP client.
#[derive(Clone)]
pub struct UpstashCacheSink {
    client: Client,
    url: Url,
    token: String,
    timeout: Duration,
}

impl UpstashCacheSink {
    pub fn new(client: Client, url: Url, token: String, timeout: Duration) -> Self {
        Self {
            client,
            url,
            token,
            timeout,
        }
    }
}

#[async_trait]
impl CacheSink for UpstashCacheSink {
    async fn backup(&self, event: &WebhookEvent) -> Result<(), SinkError> {
        let key = event.cache_key();
        let value =
            serde_json::to_string(&event.payload).map_err(|e| SinkError::Encode(e.to_string()))?;
        let command = json!(["SET", key, value, "EX", CACHE_TTL.as_secs().to_string()]);

        let resp = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&command)
            .send()
            .await?;

        let status = resp.status();
        let body: UpstashResponse = resp.json().await?;

        match body.error {
            Some(error) => Err(SinkError::Rejected(error)),
            None if !status.is_success() => Err(SinkError::Rejected(format!("status {status}"))),
            None => Ok(()),
        }
    }
}
