//! wa-relay - WhatsApp Cloud API webhook relay.
//!
//! Receives webhook events from Meta, acknowledges them immediately and fans
//! each one out in the background:
//!
//! ```text
//! Meta → POST /webhooks/whatsapp/cloudapi → 200
//!                     │
//!                     └─ spawn → MongoDB → Redis/Upstash (1h) → forward URL
//! ```
//!
//! Every downstream step is best-effort and independent of the others.

pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod forward;
pub mod relay;
pub mod sink;
pub mod web;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{CacheBackend, Config};
pub use error::{ConfigError, ForwardError, SinkError};
pub use event::WebhookEvent;
pub use forward::{Forwarder, HttpForwarder};
pub use relay::{DispatchReport, Relay, StepOutcome};
pub use sink::{CacheSink, DocumentSink, MongoDocumentSink};
pub use web::AppState;
