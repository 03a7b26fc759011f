use async_trait::async_trait;
use hooklab_core::event_bus::AnalyticsEvent;
use tracing::info;

/// Destination for flushed event batches.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn send_batch(&self, batch: &[AnalyticsEvent]) -> anyhow::Result<()>;
}

/// Writes each event as a structured tracing record under the
/// `hooklab::events` target.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl EventTransport for LogTransport {
    async fn send_batch(&self, batch: &[AnalyticsEvent]) -> anyhow::Result<()> {
        for event in batch {
            let properties = serde_json::to_string(&event.properties)?;
            info!(
                target: "hooklab::events",
                event_id = %event.event_id,
                event = event.name(),
                timestamp = %event.timestamp,
                properties = %properties,
                "analytics event"
            );
        }
        Ok(())
    }
}
