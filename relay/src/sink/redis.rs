//! Redis cache sink over the native protocol.
//!
//! The connection is opened on first use and shared afterwards. The
//! connection manager reconnects on its own when the link drops.

use std::sync::Arc;
use std::time::Duration;

use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::{CacheSink, CACHE_TTL};
use crate::error::SinkError;
use crate::event::WebhookEvent;

/// Redis-backed cache sink. Cheap to clone.
#[derive(Clone)]
pub struct RedisCacheSink {
    inner: Arc<RedisInner>,
}

struct RedisInner {
    client: ::redis::Client,
    manager: RwLock<Option<ConnectionManager>>,
    timeout: Duration,
}

impl RedisCacheSink {
    /// Validate the URL. Connecting is deferred to the first backup.
    ///
    /// `timeout` bounds a whole backup, including the first connect.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = ::redis::Client::open(url)?;

        Ok(Self {
            inner: Arc::new(RedisInner {
                client,
                manager: RwLock::new(None),
                timeout,
            }),
        })
    }

    async fn ensure_connected(&self) -> Result<ConnectionManager, SinkError> {
        {
            let manager = self.inner.manager.read().await;
            if let Some(m) = manager.as_ref() {
                return Ok(m.clone());
            }
        }

        let mut manager = self.inner.manager.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(m) = manager.as_ref() {
            return Ok(m.clone());
        }

        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(self.inner.timeout)
            .set_response_timeout(self.inner.timeout)
            .set_number_of_retries(2);

        info!("redis_connecting");
        let m = ConnectionManager::new_with_config(self.inner.client.clone(), config).await?;
        info!("redis_connected");

        *manager = Some(m.clone());
        Ok(m)
    }

    async fn set_with_expiry(&self, key: &str, value: String) -> Result<(), SinkError> {
        let mut conn = self.ensure_connected().await?;

        let _: () = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(CACHE_TTL.as_secs())
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl CacheSink for RedisCacheSink {
    async fn backup(&self, event: &WebhookEvent) -> Result<(), SinkError> {
        let key = event.cache_key();
        let value =
            serde_json::to_string(&event.payload).map_err(|e| SinkError::Encode(e.to_string()))?;

        // Dropping the future on timeout also releases the connect lock
        tokio::time::timeout(self.inner.timeout, self.set_with_expiry(&key, value))
            .await
            .map_err(|_| SinkError::TimedOut(self.inner.timeout))?
    }
}
