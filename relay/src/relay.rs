//! Background fan-out of one event to the sinks and the forwarder.
//!
//! ```text
//! WebhookEvent → persist → backup → forward
//! ```
//!
//! Steps run in order and are isolated from each other: a failure or a step
//! that outlives its time limit is logged and the next step runs anyway.
//! Nothing is retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::error::SinkError;
use crate::event::WebhookEvent;
use crate::forward::Forwarder;
use crate::sink::{CacheSink, DocumentSink};

/// What happened to one step of the fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Skipped,
    Failed,
}

/// Per-step result of a dispatch, used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub persist: StepOutcome,
    pub backup: StepOutcome,
    pub forward: StepOutcome,
}

/// Upper bound on a single step when none is configured.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Holds the injected sinks and forwarder shared by all requests.
pub struct Relay {
    document: Arc<dyn DocumentSink>,
    cache: Option<Arc<dyn CacheSink>>,
    forwarder: Option<Arc<dyn Forwarder>>,
    step_timeout: Duration,
    tasks: TaskTracker,
}

impl Relay {
    pub fn new(
        document: Arc<dyn DocumentSink>,
        cache: Option<Arc<dyn CacheSink>>,
        forwarder: Option<Arc<dyn Forwarder>>,
    ) -> Self {
        Self {
            document,
            cache,
            forwarder,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            tasks: TaskTracker::new(),
        }
    }

    /// Bound each step, so one stalled backend cannot hold up the next.
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Launch `dispatch` as an independent task and return immediately.
    pub fn spawn(self: &Arc<Self>, event: WebhookEvent) -> JoinHandle<DispatchReport> {
        let relay = Arc::clone(self);
        self.tasks.spawn(async move { relay.dispatch(&event).await })
    }

    /// Wait up to `limit` for in-flight fan-outs to finish.
    ///
    /// Returns `false` if some were still running when the limit passed.
    pub async fn drain(&self, limit: Duration) -> bool {
        self.tasks.close();
        let pending = self.tasks.len();
        if pending > 0 {
            info!(pending, "relay_draining");
        }

        tokio::time::timeout(limit, self.tasks.wait()).await.is_ok()
    }

    async fn bounded<T, F>(&self, step: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.step_timeout, step).await.ok()
    }

    /// Run every step for one event. Never fails.
    pub async fn dispatch(&self, event: &WebhookEvent) -> DispatchReport {
        let received_at_ms = event.received_at_millis();

        let timeout_ms = self.step_timeout.as_millis() as u64;

        let persist = match self.bounded(self.document.persist(event)).await {
            None => {
                error!(received_at_ms, timeout_ms, "document_persist_timed_out");
                StepOutcome::Failed
            }
            Some(Ok(())) => {
                info!(received_at_ms, "document_persisted");
                StepOutcome::Done
            }
            Some(Err(SinkError::NotConnected)) => {
                warn!(received_at_ms, "document_sink_not_connected");
                StepOutcome::Skipped
            }
            Some(Err(e)) => {
                error!(received_at_ms, error = %e, "document_persist_failed");
                StepOutcome::Failed
            }
        };

        let backup = match &self.cache {
            None => StepOutcome::Skipped,
            Some(cache) => match self.bounded(cache.backup(event)).await {
                None => {
                    error!(received_at_ms, timeout_ms, "cache_backup_timed_out");
                    StepOutcome::Failed
                }
                Some(Ok(())) => {
                    info!(received_at_ms, "cache_backup_written");
                    StepOutcome::Done
                }
                Some(Err(e)) => {
                    error!(received_at_ms, error = %e, "cache_backup_failed");
                    StepOutcome::Failed
                }
            },
        };

        let forward = match &self.forwarder {
            None => StepOutcome::Skipped,
            Some(forwarder) => match self.bounded(forwarder.forward(event)).await {
                None => {
                    error!(received_at_ms, timeout_ms, "forward_timed_out");
                    StepOutcome::Failed
                }
                Some(Ok(())) => {
                    info!(received_at_ms, "event_forwarded");
                    StepOutcome::Done
                }
                Some(Err(e)) => {
                    error!(received_at_ms, error = %e, "forward_failed");
                    StepOutcome::Failed
                }
            },
        };

        let report = DispatchReport {
            persist,
            backup,
            forward,
        };

        info!(
            received_at_ms,
            persist = ?report.persist,
            backup = ?report.backup,
            forward = ?report.forward,
            "relay_complete"
        );

        report
    }
}
