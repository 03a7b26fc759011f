//! Metrics source — where the aggregator pulls raw counters from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use hooklab_core::types::RawCounters;
use hooklab_core::{HooklabError, HooklabResult};

/// External counter provider (warehouse query, analytics API, ...).
/// Implementations own their timeout policy and report failures as
/// [`HooklabError::MetricsUnavailable`].
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_counters(&self) -> HooklabResult<RawCounters>;
}

/// Source fed by the surrounding system pushing its latest counters.
/// Unavailable until the first push, or once the last push is older than
/// `max_age`.
pub struct PushMetricsSource {
    latest: RwLock<Option<(RawCounters, DateTime<Utc>)>>,
    max_age: chrono::Duration,
}

impl PushMetricsSource {
    pub fn new(max_age: chrono::Duration) -> Self {
        Self {
            latest: RwLock::new(None),
            max_age,
        }
    }

    pub fn push(&self, counters: RawCounters) {
        *self.latest.write() = Some((counters, Utc::now()));
    }
}

#[async_trait]
impl MetricsSource for PushMetricsSource {
    async fn fetch_counters(&self) -> HooklabResult<RawCounters> {
        match &*self.latest.read() {
            None => Err(HooklabError::MetricsUnavailable(
                "no counters pushed yet".into(),
            )),
            Some((_, at)) if Utc::now() - *at > self.max_age => Err(
                HooklabError::MetricsUnavailable(format!("counters stale since {at}")),
            ),
            Some((counters, _)) => Ok(counters.clone()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_until_pushed() {
        let source = PushMetricsSource::new(chrono::Duration::minutes(5));
        assert!(matches!(
            source.fetch_counters().await,
            Err(HooklabError::MetricsUnavailable(_))
        ));

        source.push(RawCounters {
            visitors: 10,
            ..Default::default()
        });
        assert_eq!(source.fetch_counters().await.unwrap().visitors, 10);
    }

    #[tokio::test]
    async fn test_stale_counters_are_unavailable() {
        let source = PushMetricsSource::new(chrono::Duration::zero());
        source.push(RawCounters::default());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(source.fetch_counters().await.is_err());
    }
}
