//! In-memory doubles for the sinks and the forwarder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use mongodb::bson::Document;
use tokio::sync::Notify;

use crate::error::{ForwardError, SinkError};
use crate::event::WebhookEvent;
use crate::forward::Forwarder;
use crate::sink::mongo::build_record;
use crate::sink::{CacheSink, DocumentSink, CACHE_TTL};

pub fn event(body: &'static str) -> WebhookEvent {
    WebhookEvent::from_body(Bytes::from_static(body.as_bytes())).unwrap()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Ok,
    Failing,
    Disconnected,
    Hanging,
}

/// Records the documents a real store would receive.
#[derive(Default)]
pub struct FakeDocuments {
    mode: Mode,
    gate: Option<Arc<Notify>>,
    records: Mutex<Vec<Document>>,
}

impl FakeDocuments {
    pub fn failing() -> Self {
        Self {
            mode: Mode::Failing,
            ..Default::default()
        }
    }

    pub fn disconnected() -> Self {
        Self {
            mode: Mode::Disconnected,
            ..Default::default()
        }
    }

    /// Every persist waits for a permit on `gate` before writing.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn records(&self) -> Vec<Document> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSink for FakeDocuments {
    async fn persist(&self, event: &WebhookEvent) -> Result<(), SinkError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match self.mode {
            Mode::Ok => {
                self.records.lock().unwrap().push(build_record(event));
                Ok(())
            }
            Mode::Failing => Err(SinkError::Rejected("insert refused".to_string())),
            Mode::Disconnected => Err(SinkError::NotConnected),
            Mode::Hanging => std::future::pending().await,
        }
    }
}

/// One `SET key value EX ttl` as a cache would receive it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

#[derive(Default)]
pub struct FakeCache {
    mode: Mode,
    entries: Mutex<Vec<CacheEntry>>,
}

impl FakeCache {
    pub fn failing() -> Self {
        Self {
            mode: Mode::Failing,
            ..Default::default()
        }
    }

    /// Never answers, like a cache whose connect or reply stalls.
    pub fn hanging() -> Self {
        Self {
            mode: Mode::Hanging,
            ..Default::default()
        }
    }

    pub fn entries(&self) -> Vec<CacheEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheSink for FakeCache {
    async fn backup(&self, event: &WebhookEvent) -> Result<(), SinkError> {
        match self.mode {
            Mode::Ok => {}
            Mode::Hanging => std::future::pending::<()>().await,
            _ => return Err(SinkError::Rejected("cache unavailable".to_string())),
        }

        let value =
            serde_json::to_string(&event.payload).map_err(|e| SinkError::Encode(e.to_string()))?;
        self.entries.lock().unwrap().push(CacheEntry {
            key: event.cache_key(),
            value,
            ttl: CACHE_TTL,
        });
        Ok(())
    }
}

/// Counts forward attempts.
#[derive(Default)]
pub struct FakeForwarder {
    failing: bool,
    calls: AtomicUsize,
}

impl FakeForwarder {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Forwarder for FakeForwarder {
    async fn forward(&self, _event: &WebhookEvent) -> Result<(), ForwardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ForwardError::Status(500));
        }
        Ok(())
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
