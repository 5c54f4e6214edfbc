//! Event sinks: a durable document store and a short-lived cache backup.
//!
//! Both are write-only and best-effort. The relay logs any error they return
//! and moves on to the next step.

pub mod mongo;
pub mod redis;
pub mod upstash;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CacheBackend, Config};
use crate::error::SinkError;
use crate::event::WebhookEvent;

pub use self::mongo::MongoDocumentSink;
pub use self::redis::RedisCacheSink;
pub use self::upstash::UpstashCacheSink;

/// Prefix of every cache key, followed by the receipt time in epoch millis.
pub const CACHE_KEY_PREFIX: &str = "wa_event_";

/// Expiry of every cache entry.
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Durable storage of raw events.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Insert one record for the event.
    async fn persist(&self, event: &WebhookEvent) -> Result<(), SinkError>;
}

/// Write-only cache backup with expiry.
#[async_trait]
pub trait CacheSink: Send + Sync {
    /// Store the serialized payload under the event's time-derived key.
    async fn backup(&self, event: &WebhookEvent) -> Result<(), SinkError>;
}

/// Build the configured cache sink, if any.
pub fn cache_from_config(
    config: &Config,
    http: reqwest::Client,
) -> Result<Option<Arc<dyn CacheSink>>, SinkError> {
    let sink: Option<Arc<dyn CacheSink>> = match &config.cache {
        Some(CacheBackend::Redis { url }) => {
            Some(Arc::new(RedisCacheSink::new(url, config.sink_timeout())?))
        }
        Some(CacheBackend::Upstash { url, token }) => Some(Arc::new(UpstashCacheSink::new(
            http,
            url.clone(),
            token.clone(),
            config.sink_timeout(),
        ))),
        None => None,
    };

    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&'static str, &'static str)]) -> Config {
        let vars = vars.to_vec();
        Config::from_source(move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    #[test]
    fn test_no_cache_configured() {
        let config = config(&[("MONGO_URI", "mongodb://db")]);
        assert!(cache_from_config(&config, reqwest::Client::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_cache_backends_build() {
        let redis = config(&[("MONGO_URI", "mongodb://db"), ("REDIS_URL", "redis://cache:6379")]);
        assert!(cache_from_config(&redis, reqwest::Client::new())
            .unwrap()
            .is_some());

        let upstash = config(&[
            ("MONGO_URI", "mongodb://db"),
            ("UPSTASH_REDIS_REST_URL", "https://eu1-cache.upstash.io"),
            ("UPSTASH_REDIS_REST_TOKEN", "token"),
        ]);
        assert!(cache_from_config(&upstash, reqwest::Client::new())
            .unwrap()
            .is_some());
    }
}
