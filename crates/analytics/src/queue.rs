//! Queued event sink that batches events in the background.
//! Uses a channel-based architecture for non-blocking event submission.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hooklab_core::config::SinkConfig;
use hooklab_core::event_bus::{AnalyticsEvent, EventSink};
use hooklab_core::{HooklabError, HooklabResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::transport::EventTransport;

/// Best-effort sink: `emit` never blocks, and events that do not fit in the
/// buffer are dropped and counted.
pub struct QueuedEventSink {
    sender: mpsc::Sender<AnalyticsEvent>,
    dropped: AtomicU64,
}

impl QueuedEventSink {
    /// Create the sink and spawn its background writer on the current
    /// runtime. The writer drains and exits once the sink is dropped.
    pub fn spawn(config: &SinkConfig, transport: Arc<dyn EventTransport>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel::<AnalyticsEvent>(config.queue_capacity.max(1));

        let writer = BatchWriter {
            transport,
            batch_size: config.batch_size.max(1),
            flush_interval: Duration::from_millis(config.flush_interval_ms.max(1)),
        };
        let handle = tokio::spawn(writer.run(receiver));

        info!(
            queue_capacity = config.queue_capacity,
            batch_size = config.batch_size,
            "queued event sink initialized"
        );

        (
            Self {
                sender,
                dropped: AtomicU64::new(0),
            },
            handle,
        )
    }

    /// Events rejected because the buffer was full or the writer had stopped.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue one event without blocking. A rejected event is counted as
    /// dropped and reported as [`HooklabError::SinkUnavailable`].
    pub fn try_emit(&self, event: AnalyticsEvent) -> HooklabResult<()> {
        let name = event.name();
        match self.sender.try_send(event) {
            Ok(()) => {
                metrics::counter!("analytics.queued").increment(1);
                Ok(())
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("analytics.dropped").increment(1);
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "writer stopped",
                };
                Err(HooklabError::SinkUnavailable(format!("{name}: {reason}")))
            }
        }
    }
}

impl EventSink for QueuedEventSink {
    fn emit(&self, event: AnalyticsEvent) {
        if let Err(e) = self.try_emit(event) {
            warn!(error = %e, "analytics event dropped");
        }
    }
}

/// Background writer that batches events and flushes them to the transport.
struct BatchWriter {
    transport: Arc<dyn EventTransport>,
    batch_size: usize,
    flush_interval: Duration,
}

impl BatchWriter {
    async fn run(self, mut receiver: mpsc::Receiver<AnalyticsEvent>) {
        let mut buffer: Vec<AnalyticsEvent> = Vec::with_capacity(self.batch_size);
        let mut interval = tokio::time::interval_at(
            tokio::time::Instant::now() + self.flush_interval,
            self.flush_interval,
        );

        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Some(event) => {
                        buffer.push(event);
                        if buffer.len() >= self.batch_size {
                            self.flush(&mut buffer).await;
                        }
                    }
                    None => {
                        if !buffer.is_empty() {
                            self.flush(&mut buffer).await;
                        }
                        debug!("event channel closed, batch writer exiting");
                        return;
                    }
                },
                _ = interval.tick() => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer).await;
                    }
                }
            }
        }
    }

    /// One delivery attempt; a failed batch is dropped.
    async fn flush(&self, buffer: &mut Vec<AnalyticsEvent>) {
        let count = buffer.len();
        debug!(count, "flushing analytics batch");

        match self.transport.send_batch(buffer).await {
            Ok(()) => {
                metrics::counter!("analytics.flushed").increment(count as u64);
            }
            Err(e) => {
                metrics::counter!("analytics.flush_errors").increment(1);
                error!(error = %e, count, "failed to deliver analytics batch, dropping it");
            }
        }

        buffer.clear();
    }
}
