//! Configuration module for environment variable parsing.
//!
//! The document store URI is mandatory. Cache and forward settings are optional;
//! leaving them out disables that step only.

use std::env;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::error::ConfigError;

/// Verify token used when `VERIFY_TOKEN` is not set.
pub const DEFAULT_VERIFY_TOKEN: &str = "kaapavverify";

/// Environment variables checked, in order, for the forward destination.
const FORWARD_URL_VARS: &[&str] = &["FORWARD_URL", "N8N_WEBHOOK_URL", "RENDER_WORKER_URL"];

/// Which cache backend receives the backup copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// Native Redis protocol (`redis://`)
    Redis { url: String },
    /// Upstash Redis over its HTTP REST API
    Upstash { url: Url, token: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Expected `hub.verify_token` for the verification challenge
    pub verify_token: String,

    /// MongoDB connection URI
    pub mongo_uri: String,

    /// Database holding the event collection
    pub mongo_database: String,

    /// Collection receiving one document per event
    pub mongo_collection: String,

    /// Cache backend, `None` disables the cache step
    pub cache: Option<CacheBackend>,

    /// Downstream URL receiving the raw payload, `None` disables forwarding
    pub forward_url: Option<Url>,

    /// Timeout applied to the forward POST
    pub forward_timeout_ms: u64,

    /// Upper bound on each document and cache write, connect included
    pub sink_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Blank values are treated as unset.
    pub fn from_source<F>(source: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            source(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mongo_uri = get("MONGO_URI").ok_or(ConfigError::Missing("MONGO_URI"))?;

        let cache = match (
            get("REDIS_URL"),
            get("UPSTASH_REDIS_REST_URL"),
            get("UPSTASH_REDIS_REST_TOKEN"),
        ) {
            (Some(url), _, _) => Some(CacheBackend::Redis { url }),
            (None, Some(url), Some(token)) => Some(CacheBackend::Upstash {
                url: parse_url("UPSTASH_REDIS_REST_URL", &url)?,
                token,
            }),
            (None, Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    "UPSTASH_REDIS_REST_URL",
                    "UPSTASH_REDIS_REST_TOKEN",
                ))
            }
            (None, None, _) => None,
        };

        let forward_url = FORWARD_URL_VARS
            .iter()
            .find_map(|name| get(*name).map(|v| (*name, v)))
            .map(|(name, v)| parse_url(name, &v))
            .transpose()?;

        Ok(Config {
            port: parse_number(&get, "PORT", 3000),

            verify_token: get("VERIFY_TOKEN").unwrap_or_else(|| DEFAULT_VERIFY_TOKEN.to_string()),

            mongo_uri,

            mongo_database: get("MONGO_DATABASE").unwrap_or_else(|| "tiledesk".to_string()),

            mongo_collection: get("MONGO_COLLECTION")
                .unwrap_or_else(|| "whatsapp_logs".to_string()),

            cache,

            forward_url,

            forward_timeout_ms: parse_number(&get, "FORWARD_TIMEOUT_MS", 5000),

            sink_timeout_ms: parse_number(&get, "SINK_TIMEOUT_MS", 10_000),
        })
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }
}

/// Parse a numeric variable, falling back to the default when missing or malformed.
fn parse_number<T, G>(get: &G, name: &str, default: T) -> T
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }),
    }
}

/// Only http(s) destinations are accepted.
fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|name| map.get(name).cloned())
    }

    #[test]
    fn test_missing_mongo_uri_is_fatal() {
        let err = load(&[("PORT", "8080")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("MONGO_URI")));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("MONGO_URI", "mongodb://localhost:27017")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.verify_token, DEFAULT_VERIFY_TOKEN);
        assert_eq!(config.mongo_database, "tiledesk");
        assert_eq!(config.mongo_collection, "whatsapp_logs");
        assert_eq!(config.cache, None);
        assert!(config.forward_url.is_none());
        assert_eq!(config.forward_timeout(), Duration::from_secs(5));
        assert_eq!(config.sink_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_cache_key_and_ttl_are_not_configurable() {
        // Only the backend is chosen from the environment
        let config = load(&[
            ("MONGO_URI", "mongodb://db"),
            ("REDIS_URL", "redis://cache:6379"),
            ("CACHE_TTL_SECS", "0"),
            ("CACHE_KEY_PREFIX", "evt:"),
        ])
        .unwrap();
        let event = crate::WebhookEvent::from_body(axum::body::Bytes::from_static(b"{}")).unwrap();
        assert!(event.cache_key().starts_with("wa_event_"));
        assert_eq!(crate::sink::CACHE_TTL, Duration::from_secs(3600));
        assert!(matches!(config.cache, Some(CacheBackend::Redis { .. })));
    }

    #[test]
    fn test_malformed_number_uses_default() {
        let config = load(&[("MONGO_URI", "mongodb://db"), ("PORT", "eighty")]).unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_redis_url_wins_over_upstash() {
        let config = load(&[
            ("MONGO_URI", "mongodb://db"),
            ("REDIS_URL", "redis://cache:6379"),
            ("UPSTASH_REDIS_REST_URL", "https://eu1.upstash.io"),
            ("UPSTASH_REDIS_REST_TOKEN", "secret"),
        ])
        .unwrap();
        assert_eq!(
            config.cache,
            Some(CacheBackend::Redis {
                url: "redis://cache:6379".to_string()
            })
        );
    }

    #[test]
    fn test_upstash_requires_token() {
        let err = load(&[
            ("MONGO_URI", "mongodb://db"),
            ("UPSTASH_REDIS_REST_URL", "https://eu1.upstash.io"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete(..)));
    }

    #[test]
    fn test_forward_url_aliases_and_blank() {
        let config = load(&[
            ("MONGO_URI", "mongodb://db"),
            ("FORWARD_URL", "  "),
            ("N8N_WEBHOOK_URL", "https://n8n.example.com/webhook/wa"),
        ])
        .unwrap();
        assert_eq!(
            config.forward_url.unwrap().as_str(),
            "https://n8n.example.com/webhook/wa"
        );
    }

    #[test]
    fn test_forward_url_rejects_non_http() {
        let err = load(&[
            ("MONGO_URI", "mongodb://db"),
            ("RENDER_WORKER_URL", "ftp://worker.example.com"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                name: "RENDER_WORKER_URL",
                ..
            }
        ));
    }
}
