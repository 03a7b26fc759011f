//! Scoring engine — keeps behavior profiles and score records per visitor
//! and rescores on every behavior update.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use hooklab_core::event_bus::{noop_sink, record_event, EventSink};
use hooklab_core::types::{
    BehaviorProfile, BehaviorSignal, ScoreProfile, TrialEngagement, VisitorSegment,
};
use hooklab_core::EventType;

use crate::model::ScoringModel;

/// Behavior and the score computed from it. Stored as one value so the
/// score never lags the behavior it describes.
#[derive(Debug, Clone)]
struct VisitorRecord {
    behavior: BehaviorProfile,
    score: ScoreProfile,
}

pub struct ScoringEngine {
    model: ScoringModel,
    visitors: DashMap<String, VisitorRecord>,
    trials: DashMap<String, TrialEngagement>,
    event_sink: Arc<dyn EventSink>,
}

impl ScoringEngine {
    pub fn new(model: ScoringModel) -> Self {
        Self {
            model,
            visitors: DashMap::new(),
            trials: DashMap::new(),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink for emitting analytics events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }

    /// Score a behavior snapshot, replacing the stored profile and score.
    pub fn score(&self, behavior: &BehaviorProfile, segment: &VisitorSegment) -> ScoreProfile {
        let profile = self.compute(behavior, segment);
        self.visitors.insert(
            behavior.visitor_id.clone(),
            VisitorRecord {
                behavior: behavior.clone(),
                score: profile.clone(),
            },
        );
        self.publish(&profile);
        profile
    }

    /// Fold one interaction into the visitor's profile and rescore. The
    /// update and the rescore happen under the visitor's entry lock.
    pub fn record_behavior(
        &self,
        visitor_id: &str,
        signal: BehaviorSignal,
        segment: &VisitorSegment,
    ) -> ScoreProfile {
        let profile = match self.visitors.entry(visitor_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.behavior.apply(&signal);
                record.score = self.compute(&record.behavior, segment);
                record.score.clone()
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let mut behavior = BehaviorProfile::new(visitor_id);
                behavior.apply(&signal);
                let score = self.compute(&behavior, segment);
                slot.insert(VisitorRecord {
                    behavior,
                    score: score.clone(),
                });
                score
            }
        };
        self.publish(&profile);
        profile
    }

    /// Attach trial usage so future scores carry a churn risk.
    pub fn set_trial_engagement(&self, visitor_id: &str, engagement: TrialEngagement) {
        self.trials.insert(visitor_id.to_string(), engagement);
    }

    pub fn get_score(&self, visitor_id: &str) -> Option<ScoreProfile> {
        self.visitors.get(visitor_id).map(|r| r.score.clone())
    }

    pub fn get_behavior(&self, visitor_id: &str) -> Option<BehaviorProfile> {
        self.visitors.get(visitor_id).map(|r| r.behavior.clone())
    }

    pub fn scored_visitors(&self) -> usize {
        self.visitors.len()
    }

    fn compute(&self, behavior: &BehaviorProfile, segment: &VisitorSegment) -> ScoreProfile {
        let trial = self.trials.get(&behavior.visitor_id).map(|t| t.clone());
        self.model
            .score(behavior, segment, trial.as_ref(), Utc::now())
    }

    fn publish(&self, profile: &ScoreProfile) {
        debug!(
            visitor_id = %profile.visitor_id,
            lead_score = profile.lead_score,
            conversion_probability = profile.conversion_probability,
            predicted_ltv = profile.predicted_ltv,
            "visitor scored"
        );
        metrics::histogram!("scoring.lead_score").record(profile.lead_score as f64);
        self.event_sink
            .emit(record_event(EventType::LeadScored, profile));
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringModel::default())
    }
}
