//! MongoDB document sink.
//!
//! Startup only checks the URI syntax. Building the client (which resolves
//! `mongodb+srv://` seed lists over DNS) and the first round-trip happen in a
//! background task that retries with exponential backoff until the server
//! answers; until then `persist` skips events instead of blocking on server
//! selection.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, DateTime, Document};
use mongodb::options::{ClientOptions, ConnectionString};
use mongodb::{Client, Collection};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::DocumentSink;
use crate::backoff::Backoff;
use crate::error::SinkError;
use crate::event::WebhookEvent;

/// MongoDB-backed document sink. Cheap to clone.
#[derive(Clone)]
pub struct MongoDocumentSink {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    uri: String,
    database: String,
    collection_name: String,
    timeout: Duration,
    collection: OnceLock<Collection<Document>>,
}

impl MongoDocumentSink {
    /// Check the URI syntax. Does not resolve hosts or contact the server.
    ///
    /// `timeout` bounds each insert.
    pub fn new(
        uri: &str,
        database: &str,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        ConnectionString::parse(uri)?;

        Ok(Self {
            inner: Arc::new(MongoInner {
                uri: uri.to_string(),
                database: database.to_string(),
                collection_name: collection.to_string(),
                timeout,
                collection: OnceLock::new(),
            }),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.inner.collection.get().is_some()
    }

    async fn connect(&self) -> Result<Collection<Document>, SinkError> {
        let mut options = ClientOptions::parse(&self.inner.uri).await?;
        options.app_name = Some("wa-relay".to_string());
        options.server_selection_timeout = Some(Duration::from_secs(30));
        options.connect_timeout = Some(Duration::from_secs(10));

        let client = Client::with_options(options)?;
        client.database("admin").run_command(doc! { "ping": 1 }).await?;

        Ok(client
            .database(&self.inner.database)
            .collection::<Document>(&self.inner.collection_name))
    }

    /// Build the client and ping the server until it answers, sleeping per
    /// `backoff` between attempts.
    pub async fn connect_with_retry(&self, mut backoff: Backoff) {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            info!(attempt = attempt, "mongo_connecting");

            match self.connect().await {
                Ok(collection) => {
                    let collection = self.inner.collection.get_or_init(|| collection);
                    info!(
                        attempt = attempt,
                        collection = %collection.namespace(),
                        "mongo_connected"
                    );
                    return;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        attempt = attempt,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "mongo_connect_failed"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Run `connect_with_retry` in the background.
    pub fn spawn_connect(&self, backoff: Backoff) -> JoinHandle<()> {
        let sink = self.clone();
        tokio::spawn(async move { sink.connect_with_retry(backoff).await })
    }
}

/// Document shape: `{ data: <payload>, createdAt: <receipt time> }`.
pub fn build_record(event: &WebhookEvent) -> Document {
    doc! {
        "data": json_to_bson(&event.payload),
        "createdAt": DateTime::from_system_time(event.received_at),
    }
}

/// Integers beyond the `i64` range are stored as doubles.
fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(fields) => Bson::Document(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_bson(v)))
                .collect(),
        ),
    }
}

#[async_trait]
impl DocumentSink for MongoDocumentSink {
    async fn persist(&self, event: &WebhookEvent) -> Result<(), SinkError> {
        let collection = self.inner.collection.get().ok_or(SinkError::NotConnected)?;

        tokio::time::timeout(self.inner.timeout, collection.insert_one(build_record(event)))
            .await
            .map_err(|_| SinkError::TimedOut(self.inner.timeout))??;

        Ok(())
    }
}
