//! Webhook endpoint handlers.
//!
//! The POST handler only parses the body, hands the event to the relay and
//! returns 200. Persisting, caching and forwarding happen in a background
//! task whose outcome never reaches the caller.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};
use tracing::{info, warn};

use crate::event::WebhookEvent;
use crate::relay::Relay;
use crate::web::verify::{verify, ChallengeResult, VerifyQuery};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(config: Config, relay: Relay) -> Self {
        Self {
            config: Arc::new(config),
            relay: Arc::new(relay),
        }
    }
}

/// Liveness probe.
pub async fn ping() -> &'static str {
    "OK"
}

/// Subscription verification (GET).
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> ChallengeResult {
    let result = verify(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        &state.config.verify_token,
    );

    match &result {
        ChallengeResult::Accepted(_) => info!("webhook_verified"),
        ChallengeResult::Rejected => warn!(
            mode = ?query.mode,
            has_token = query.verify_token.is_some(),
            "webhook_verification_failed"
        ),
    }

    result
}

/// Event delivery (POST).
pub async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let event = match WebhookEvent::from_body(body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "webhook_body_invalid");
            return StatusCode::BAD_REQUEST;
        }
    };

    info!(
        body_length = event.raw.len(),
        object = event.payload.get("object").and_then(|v| v.as_str()).unwrap_or(""),
        received_at_ms = event.received_at_millis(),
        "webhook_received"
    );

    // Not awaited: the response goes out regardless of how the fan-out ends
    state.relay.spawn(event);

    StatusCode::OK
}
