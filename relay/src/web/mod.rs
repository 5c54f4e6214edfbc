//! HTTP surface of the relay.
//!
//! | Method | Path                          | Handler            |
//! |--------|-------------------------------|--------------------|
//! | GET    | `/webhooks/whatsapp/cloudapi` | `verify_webhook`   |
//! | POST   | `/webhooks/whatsapp/cloudapi` | `receive_webhook`  |
//! | GET    | `/ping`                       | `ping`             |

pub mod handlers;
pub mod verify;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use handlers::{ping, receive_webhook, verify_webhook, AppState};
pub use verify::{verify, ChallengeResult, VerifyQuery};

/// Path Meta delivers WhatsApp Cloud API events to.
pub const WEBHOOK_PATH: &str = "/webhooks/whatsapp/cloudapi";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route(WEBHOOK_PATH, get(verify_webhook).post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
