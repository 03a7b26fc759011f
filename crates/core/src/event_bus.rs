//! Unified event bus — trait for emitting analytics events from any module.
//!
//! Engines accept an `Arc<dyn EventSink>` and never reach for an ambient
//! analytics global. Delivery is best-effort: `emit` must not block the
//! caller and has no way to report failure back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AbTestAssigned,
    AbTestConversion,
    VisitorSegmented,
    LeadScored,
    MetricsSnapshot,
    AlertRaised,
    AlertRetired,
}

impl EventType {
    /// Wire name of the event as seen by the downstream sink.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbTestAssigned => "ab_test_assigned",
            Self::AbTestConversion => "ab_test_conversion",
            Self::VisitorSegmented => "visitor_segmented",
            Self::LeadScored => "lead_scored",
            Self::MetricsSnapshot => "metrics_snapshot",
            Self::AlertRaised => "alert_raised",
            Self::AlertRetired => "alert_retired",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named event with free-form properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub properties: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn name(&self) -> &'static str {
        self.event_type.as_str()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Trait for emitting analytics events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AnalyticsEvent);
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: AnalyticsEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: AnalyticsEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating `AnalyticsEvent` from a property list.
pub fn make_event<I, K>(event_type: EventType, properties: I) -> AnalyticsEvent
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    AnalyticsEvent {
        event_id: Uuid::new_v4(),
        event_type,
        properties: properties
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect(),
        timestamp: Utc::now(),
    }
}

/// Build an event whose properties are the fields of a serializable record.
/// Records that do not serialize to a JSON object are stored under `value`.
pub fn record_event<T: Serialize>(event_type: EventType, record: &T) -> AnalyticsEvent {
    let properties = match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
        Err(e) => {
            tracing::warn!(error = %e, event = %event_type, "event payload failed to serialize");
            Map::new()
        }
    };
    AnalyticsEvent {
        event_id: Uuid::new_v4(),
        event_type,
        properties,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        sink.emit(make_event(
            EventType::AbTestAssigned,
            [("test_id", json!("hero")), ("variant", json!("a"))],
        ));
        sink.emit(make_event(
            EventType::LeadScored,
            [("visitor_id", json!("u1"))],
        ));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_type(EventType::AbTestAssigned), 1);
        assert_eq!(sink.count_type(EventType::LeadScored), 1);

        let events = sink.events();
        assert_eq!(events[0].name(), "ab_test_assigned");
        assert_eq!(events[0].property("variant"), Some(&json!("a")));

        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        // Should not panic
        sink.emit(make_event(EventType::MetricsSnapshot, Vec::<(String, Value)>::new()));
    }

    #[test]
    fn test_record_event_flattens_struct() {
        #[derive(Serialize)]
        struct Record {
            visitor_id: &'static str,
            lead_score: u8,
        }

        let event = record_event(
            EventType::LeadScored,
            &Record {
                visitor_id: "u1",
                lead_score: 42,
            },
        );
        assert_eq!(event.property("lead_score"), Some(&json!(42)));

        let scalar = record_event(EventType::LeadScored, &7);
        assert_eq!(scalar.property("value"), Some(&json!(7)));
    }

    #[test]
    fn test_event_names_match_serde() {
        let encoded = serde_json::to_value(EventType::AbTestConversion).unwrap();
        assert_eq!(encoded, json!(EventType::AbTestConversion.as_str()));
    }
}
