//! Error types for configuration, sinks and forwarding.
//!
//! Only `ConfigError` is ever fatal. Sink and forward errors are logged by the
//! relay and dropped; they never reach the webhook caller.

use thiserror::Error;

/// Startup configuration failures. The process refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
}

/// A failed document or cache write.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is not connected")]
    NotConnected,

    #[error("sink did not answer within {0:?}")]
    TimedOut(std::time::Duration),

    #[error("payload could not be encoded: {0}")]
    Encode(String),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cache rejected command: {0}")]
    Rejected(String),
}

/// A failed forward POST.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("request timed out")]
    Timeout,

    #[error("destination responded with status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}
