//! Metrics aggregator — periodically pulls counters, publishes a snapshot
//! and raises or retires threshold alerts.
//!
//! Only one evaluation cycle runs at a time. A tick or trigger that arrives
//! while a cycle is in flight is skipped rather than queued; a failed pull
//! leaves the previous snapshot current.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use hooklab_core::config::{AggregatorConfig, AlertRule};
use hooklab_core::event_bus::{make_event, noop_sink, record_event, EventSink};
use hooklab_core::types::{Alert, MetricsSnapshot};
use hooklab_core::EventType;

use crate::alerts::AlertLog;
use crate::rules::{alert_message, triggered};
use crate::snapshot::derive_snapshot;
use crate::source::MetricsSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorState {
    Idle,
    Evaluating,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed {
        snapshot_id: Uuid,
        raised: Vec<String>,
        retired: Vec<String>,
    },
    /// Another cycle was already running.
    Busy,
    /// The metrics source failed; the previous snapshot stays current.
    SourceUnavailable,
}

pub struct MetricsAggregator {
    source: Arc<dyn MetricsSource>,
    rules: Vec<AlertRule>,
    interval: Duration,
    alert_log: AlertLog,
    firing: Mutex<HashSet<String>>,
    current: RwLock<Option<Arc<MetricsSnapshot>>>,
    evaluating: AtomicBool,
    event_sink: Arc<dyn EventSink>,
}

impl MetricsAggregator {
    pub fn new(config: &AggregatorConfig, source: Arc<dyn MetricsSource>) -> Self {
        Self {
            source,
            rules: config.rules.clone(),
            interval: Duration::from_secs(config.interval_secs.max(1)),
            alert_log: AlertLog::new(config.alert_log_capacity),
            firing: Mutex::new(HashSet::new()),
            current: RwLock::new(None),
            evaluating: AtomicBool::new(false),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink for emitting analytics events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> AggregatorState {
        if self.evaluating.load(Ordering::Acquire) {
            AggregatorState::Evaluating
        } else {
            AggregatorState::Idle
        }
    }

    pub fn current_snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.current.read().clone()
    }

    /// Recent alerts, oldest first, bounded by the log capacity.
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alert_log.entries()
    }

    /// Ids of rules whose condition held on the last completed cycle.
    pub fn firing_rules(&self) -> Vec<String> {
        let firing = self.firing.lock();
        self.rules
            .iter()
            .filter(|r| firing.contains(&r.id))
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Run one evaluation cycle now.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .evaluating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            metrics::counter!("aggregator.skipped").increment(1);
            debug!("aggregator cycle already running, skipping");
            return CycleOutcome::Busy;
        }
        let _idle = IdleOnDrop(&self.evaluating);

        let counters = match self.source.fetch_counters().await {
            Ok(counters) => counters,
            Err(e) => {
                metrics::counter!("aggregator.source_errors").increment(1);
                if e.is_recoverable() {
                    warn!(error = %e, "metrics source unavailable, keeping previous snapshot");
                } else {
                    error!(error = %e, "metrics source failed, keeping previous snapshot");
                }
                return CycleOutcome::SourceUnavailable;
            }
        };

        let snapshot = Arc::new(derive_snapshot(&counters, Utc::now()));
        let (raised, retired) = self.evaluate_rules(&snapshot);

        *self.current.write() = Some(snapshot.clone());
        metrics::counter!("aggregator.cycles").increment(1);

        self.event_sink
            .emit(record_event(EventType::MetricsSnapshot, &*snapshot));
        for alert in &raised {
            self.event_sink
                .emit(record_event(EventType::AlertRaised, alert));
        }
        for rule_id in &retired {
            self.event_sink.emit(make_event(
                EventType::AlertRetired,
                [("id", json!(rule_id)), ("snapshot_id", json!(snapshot.id))],
            ));
        }

        debug!(
            snapshot_id = %snapshot.id,
            visitors = snapshot.visitors,
            conversion_rate = snapshot.conversion_rate,
            raised = raised.len(),
            retired = retired.len(),
            "aggregator cycle completed"
        );

        CycleOutcome::Completed {
            snapshot_id: snapshot.id,
            raised: raised.into_iter().map(|a| a.id).collect(),
            retired,
        }
    }

    fn evaluate_rules(&self, snapshot: &MetricsSnapshot) -> (Vec<Alert>, Vec<String>) {
        let holding = triggered(&self.rules, snapshot);
        let mut firing = self.firing.lock();

        let mut raised = Vec::new();
        for rule in &holding {
            if firing.insert(rule.id.clone()) {
                let alert = Alert {
                    id: rule.id.clone(),
                    message: alert_message(rule, snapshot),
                    severity: rule.severity,
                    timestamp: snapshot.captured_at,
                    snapshot_id: snapshot.id,
                };
                warn!(rule = %alert.id, severity = ?alert.severity, detail = %alert.message, "alert raised");
                metrics::counter!("alerts.raised").increment(1);
                self.alert_log.push(alert.clone());
                raised.push(alert);
            }
        }

        let holding_ids: HashSet<&str> = holding.iter().map(|r| r.id.as_str()).collect();
        let retired: Vec<String> = firing
            .iter()
            .filter(|id| !holding_ids.contains(id.as_str()))
            .cloned()
            .collect();
        for id in &retired {
            firing.remove(id);
            info!(rule = %id, "alert retired");
        }

        (raised, retired)
    }

    /// Spawn the periodic loop. It stops when `shutdown` flips to `true`.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(interval_ms = self.interval.as_millis() as u64, "metrics aggregator started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_cycle().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("metrics aggregator stopped");
        })
    }
}

/// Returns the aggregator to `Idle` however the cycle exits.
struct IdleOnDrop<'a>(&'a AtomicBool);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
