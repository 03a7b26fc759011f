//! Segmentation engine — composes the classifiers and keeps the latest
//! segment per visitor.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use hooklab_core::event_bus::{noop_sink, record_event, EventSink};
use hooklab_core::types::{VisitorContext, VisitorSegment};
use hooklab_core::EventType;

use crate::device::classify_device;
use crate::geo::classify_geo;
use crate::persona::classify_persona;
use crate::traffic::classify_traffic_source;

/// Classify a visitor context. Pure apart from the `classified_at` stamp.
pub fn classify(context: &VisitorContext) -> VisitorSegment {
    VisitorSegment {
        visitor_id: context.visitor_id.clone(),
        traffic_source: classify_traffic_source(&context.referrer),
        creator_persona: classify_persona(context),
        device_category: classify_device(&context.user_agent, context.viewport),
        geo: classify_geo(context.timezone.as_deref(), context.locale.as_deref()),
        classified_at: Utc::now(),
    }
}

pub struct SegmentationEngine {
    segments: DashMap<String, VisitorSegment>,
    event_sink: Arc<dyn EventSink>,
}

impl SegmentationEngine {
    pub fn new() -> Self {
        Self {
            segments: DashMap::new(),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink for emitting analytics events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Classify and upsert the visitor's segment. A new session with a
    /// different referrer or device replaces the previous record.
    pub fn classify(&self, context: &VisitorContext) -> VisitorSegment {
        let segment = classify(context);
        debug!(
            visitor_id = %segment.visitor_id,
            traffic = ?segment.traffic_source.category,
            persona = ?segment.creator_persona.persona_type,
            device = segment.device_category.category.as_str(),
            "visitor classified"
        );
        self.segments
            .insert(segment.visitor_id.clone(), segment.clone());
        self.event_sink
            .emit(record_event(EventType::VisitorSegmented, &segment));
        segment
    }

    pub fn get_segment(&self, visitor_id: &str) -> Option<VisitorSegment> {
        self.segments.get(visitor_id).map(|s| s.clone())
    }

    pub fn list_segments(&self) -> Vec<VisitorSegment> {
        self.segments.iter().map(|s| s.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self::new()
    }
}
