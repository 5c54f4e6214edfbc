//! The webhook event as received from the provider.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use serde_json::Value;

use crate::sink::CACHE_KEY_PREFIX;

/// One inbound webhook delivery.
///
/// The payload is opaque: it is never validated, transformed or redacted.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Request body exactly as received
    pub raw: Bytes,
    /// Request body parsed as JSON
    pub payload: Value,
    /// Server-assigned receipt time
    pub received_at: SystemTime,
}

impl WebhookEvent {
    /// Parse a request body, stamping it with the current time.
    pub fn from_body(raw: Bytes) -> Result<Self, serde_json::Error> {
        let payload = serde_json::from_slice(&raw)?;
        Ok(Self {
            raw,
            payload,
            received_at: SystemTime::now(),
        })
    }

    /// Receipt time in milliseconds since the Unix epoch.
    pub fn received_at_millis(&self) -> u64 {
        self.received_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Cache key for this event, e.g. `wa_event_1718000000000`.
    pub fn cache_key(&self) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, self.received_at_millis())
    }
}
