//! Downstream relay of the raw event body.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use url::Url;

use crate::error::ForwardError;
use crate::event::WebhookEvent;
use crate::Config;

/// Sends an event to a second system for further processing.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, event: &WebhookEvent) -> Result<(), ForwardError>;
}

/// POSTs the raw body, byte for byte, to one fixed URL.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client,
    destination: Url,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(client: Client, destination: Url, timeout: Duration) -> Self {
        Self {
            client,
            destination,
            timeout,
        }
    }
}

/// Build the forwarder, or `None` when no destination is configured.
pub fn from_config(config: &Config, client: Client) -> Option<Arc<dyn Forwarder>> {
    config.forward_url.clone().map(|url| {
        Arc::new(HttpForwarder::new(client, url, config.forward_timeout())) as Arc<dyn Forwarder>
    })
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, event: &WebhookEvent) -> Result<(), ForwardError> {
        let resp = self
            .client
            .post(self.destination.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(event.raw.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForwardError::Timeout
                } else {
                    ForwardError::Request(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status.as_u16()));
        }

        Ok(())
    }
}
