//! Verification challenge for webhook subscription.
//!
//! Meta sends `GET ?hub.mode=subscribe&hub.verify_token=...&hub.challenge=...`
//! once when the webhook URL is registered. Echoing the challenge proves
//! ownership of the endpoint.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

/// Query parameters of the verification request.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Outcome of a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeResult {
    /// Echo this challenge back with 200
    Accepted(String),
    /// Answer 403
    Rejected,
}

/// Accept only `mode == "subscribe"` with the expected token.
pub fn verify(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &str,
) -> ChallengeResult {
    match (mode, token, challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == expected_token => {
            ChallengeResult::Accepted(challenge.to_string())
        }
        _ => ChallengeResult::Rejected,
    }
}

impl IntoResponse for ChallengeResult {
    fn into_response(self) -> Response {
        match self {
            ChallengeResult::Accepted(challenge) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                challenge,
            )
                .into_response(),
            ChallengeResult::Rejected => StatusCode::FORBIDDEN.into_response(),
        }
    }
}
