//! `HookEngine` — the Scoring API. Wires the experiment, segmentation,
//! scoring and monitoring engines behind one handle shared by every caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use hooklab_core::config::AppConfig;
use hooklab_core::event_bus::{noop_sink, EventSink};
use hooklab_core::types::{
    Alert, BehaviorProfile, BehaviorSignal, MetricsSnapshot, RawCounters, ScoreProfile,
    TrialEngagement, VisitorContext, VisitorSegment,
};
use hooklab_core::HooklabResult;
use hooklab_experimentation::assignment::AssignmentStore;
use hooklab_experimentation::significance::significance_at;
use hooklab_experimentation::{
    AllocationSlot, Assignment, ExperimentEngine, InMemoryAssignmentStore, SignificanceResult,
    TestDefinition, TestResults,
};
use hooklab_monitoring::{MetricsAggregator, MetricsSource};
use hooklab_scoring::{ScoringEngine, ScoringModel};
use hooklab_segmentation::SegmentationEngine;

pub struct HookEngine {
    experiments: Arc<ExperimentEngine>,
    segmentation: SegmentationEngine,
    scoring: ScoringEngine,
    aggregator: Arc<MetricsAggregator>,
    confidence_level: f64,
}

impl HookEngine {
    /// Build every engine from configuration with an in-memory assignment
    /// store.
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn MetricsSource>,
        event_sink: Arc<dyn EventSink>,
    ) -> HooklabResult<Self> {
        Self::with_store(
            config,
            Arc::new(InMemoryAssignmentStore::new()),
            source,
            event_sink,
        )
    }

    /// Fails with a configuration error when the configuration does not
    /// validate, e.g. a confidence level outside `(0, 1)`.
    pub fn with_store(
        config: &AppConfig,
        store: Arc<dyn AssignmentStore>,
        source: Arc<dyn MetricsSource>,
        event_sink: Arc<dyn EventSink>,
    ) -> HooklabResult<Self> {
        config.validate()?;
        Ok(Self::build(config, store, source, event_sink))
    }

    /// Engine with default configuration, a silent sink and the given source.
    pub fn with_defaults(source: Arc<dyn MetricsSource>) -> Self {
        Self::build(
            &AppConfig::default(),
            Arc::new(InMemoryAssignmentStore::new()),
            source,
            noop_sink(),
        )
    }

    fn build(
        config: &AppConfig,
        store: Arc<dyn AssignmentStore>,
        source: Arc<dyn MetricsSource>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        let confidence_level = config.experiments.confidence_level;
        let experiments = Arc::new(
            ExperimentEngine::new(store)
                .with_confidence_level(confidence_level)
                .with_event_sink(event_sink.clone()),
        );
        let segmentation = SegmentationEngine::new().with_event_sink(event_sink.clone());
        let scoring = ScoringEngine::new(ScoringModel::new(config.scoring.clone()))
            .with_event_sink(event_sink.clone());

        let source = Arc::new(ExperimentAwareSource {
            inner: source,
            experiments: experiments.clone(),
        });
        let aggregator = Arc::new(
            MetricsAggregator::new(&config.aggregator, source).with_event_sink(event_sink),
        );

        info!(
            confidence_level,
            rules = config.aggregator.rules.len(),
            "hook engine initialized"
        );

        Self {
            experiments,
            segmentation,
            scoring,
            aggregator,
            confidence_level,
        }
    }

    pub fn experiments(&self) -> &ExperimentEngine {
        &self.experiments
    }

    pub fn aggregator(&self) -> &Arc<MetricsAggregator> {
        &self.aggregator
    }

    // ─── Experiments ────────────────────────────────────────────────────────

    pub fn register_test(&self, definition: TestDefinition) -> HooklabResult<()> {
        self.experiments.register_test(definition)
    }

    pub fn assign(
        &self,
        test_id: &str,
        visitor_id: &str,
        variants: &[String],
        allocation: &[AllocationSlot],
    ) -> HooklabResult<Assignment> {
        self.experiments
            .assign(test_id, visitor_id, variants, allocation)
    }

    pub fn assign_registered(&self, test_id: &str, visitor_id: &str) -> HooklabResult<Assignment> {
        self.experiments.assign_registered(test_id, visitor_id)
    }

    /// Record a goal event. Without an explicit goal the test's tracked goal
    /// is used.
    pub fn record_conversion(
        &self,
        test_id: &str,
        visitor_id: &str,
        goal: Option<&str>,
    ) -> HooklabResult<bool> {
        let goal = match goal {
            Some(goal) => goal.to_string(),
            None => self
                .experiments
                .get_test(test_id)
                .map(|t| t.goal)
                .unwrap_or_else(|| "conversion".to_string()),
        };
        self.experiments
            .record_conversion(test_id, visitor_id, &goal)
    }

    pub fn results(&self, test_id: &str) -> HooklabResult<TestResults> {
        self.experiments.evaluate(test_id)
    }

    /// Significance at the configured confidence level unless overridden.
    pub fn compute_significance(
        &self,
        control_conversions: u64,
        control_visitors: u64,
        variant_conversions: u64,
        variant_visitors: u64,
        confidence_level: Option<f64>,
    ) -> HooklabResult<SignificanceResult> {
        significance_at(
            control_conversions,
            control_visitors,
            variant_conversions,
            variant_visitors,
            confidence_level.unwrap_or(self.confidence_level),
        )
    }

    // ─── Segmentation & scoring ─────────────────────────────────────────────

    pub fn classify(&self, context: &VisitorContext) -> VisitorSegment {
        self.segmentation.classify(context)
    }

    pub fn segment(&self, visitor_id: &str) -> Option<VisitorSegment> {
        self.segmentation.get_segment(visitor_id)
    }

    /// Score a behavior profile against the visitor's stored segment, or an
    /// explicitly supplied one.
    pub fn score(
        &self,
        behavior: &BehaviorProfile,
        segment: Option<&VisitorSegment>,
    ) -> ScoreProfile {
        match segment {
            Some(segment) => self.scoring.score(behavior, segment),
            None => {
                let segment = self.segment_or_default(&behavior.visitor_id);
                self.scoring.score(behavior, &segment)
            }
        }
    }

    pub fn record_behavior(&self, visitor_id: &str, signal: BehaviorSignal) -> ScoreProfile {
        let segment = self.segment_or_default(visitor_id);
        self.scoring.record_behavior(visitor_id, signal, &segment)
    }

    pub fn set_trial_engagement(&self, visitor_id: &str, engagement: TrialEngagement) {
        self.scoring.set_trial_engagement(visitor_id, engagement);
    }

    pub fn get_score(&self, visitor_id: &str) -> Option<ScoreProfile> {
        self.scoring.get_score(visitor_id)
    }

    /// Unclassified visitors are scored as if they arrived with an empty
    /// context: direct traffic, general user.
    fn segment_or_default(&self, visitor_id: &str) -> VisitorSegment {
        self.segmentation.get_segment(visitor_id).unwrap_or_else(|| {
            debug!(visitor_id, "no segment recorded, scoring with default segment");
            hooklab_segmentation::classify(&VisitorContext {
                visitor_id: visitor_id.to_string(),
                ..Default::default()
            })
        })
    }

    // ─── Monitoring ─────────────────────────────────────────────────────────

    pub fn current_snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.aggregator.current_snapshot()
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.aggregator.active_alerts()
    }
}

/// Fills the experiment counters of a snapshot from the live engine so the
/// external source only has to report traffic counters.
struct ExperimentAwareSource {
    inner: Arc<dyn MetricsSource>,
    experiments: Arc<ExperimentEngine>,
}

#[async_trait]
impl MetricsSource for ExperimentAwareSource {
    async fn fetch_counters(&self) -> HooklabResult<RawCounters> {
        let mut counters = self.inner.fetch_counters().await?;
        let tests = self.experiments.list_tests();
        let mut significant = 0;
        for test in &tests {
            match self.experiments.evaluate(&test.test_id) {
                Ok(results) => {
                    if results.comparisons.iter().any(|c| c.result.is_significant) {
                        significant += 1;
                    }
                }
                Err(e) => {
                    metrics::counter!("aggregator.evaluation_errors").increment(1);
                    warn!(test_id = %test.test_id, error = %e, "skipping test in significance count");
                }
            }
        }
        counters.active_tests = tests.len() as u32;
        counters.significant_tests = significant as u32;
        Ok(counters)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hooklab_core::types::{TrafficCategory, Viewport};
    use hooklab_core::HooklabError;
    use hooklab_monitoring::PushMetricsSource;

    fn engine() -> (HookEngine, Arc<PushMetricsSource>) {
        let source = Arc::new(PushMetricsSource::new(chrono::Duration::minutes(5)));
        (HookEngine::with_defaults(source.clone()), source)
    }

    #[test]
    fn test_conversion_uses_tracked_goal_by_default() {
        let (engine, _) = engine();
        engine
            .register_test(TestDefinition::new("cta", &[("control", 50), ("bold", 50)]).with_goal("signup"))
            .unwrap();
        engine.assign_registered("cta", "v1").unwrap();

        assert!(!engine.record_conversion("cta", "v1", Some("purchase")).unwrap());
        assert!(engine.record_conversion("cta", "v1", None).unwrap());
        assert!(!engine.record_conversion("cta", "v1", None).unwrap());
    }

    #[test]
    fn test_compute_significance_confidence_override() {
        let (engine, _) = engine();
        let default = engine
            .compute_significance(100, 2000, 132, 2000, None)
            .unwrap();
        let strict = engine
            .compute_significance(100, 2000, 132, 2000, Some(0.99))
            .unwrap();
        assert!(default.is_significant);
        assert!(!strict.is_significant);
        assert!(matches!(
            engine.compute_significance(1, 0, 1, 10, None),
            Err(HooklabError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_behavior_scored_with_recorded_segment() {
        let (engine, _) = engine();
        let segment = engine.classify(&VisitorContext {
            visitor_id: "v1".into(),
            referrer: "https://shop.example/?gclid=abc".into(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".into(),
            viewport: Viewport::new(1440, 900),
            screen: Viewport::new(1440, 900),
            ..Default::default()
        });
        assert_eq!(segment.traffic_source.category, TrafficCategory::Paid);

        let first = engine.record_behavior("v1", BehaviorSignal::PageView);
        let second = engine.record_behavior("v1", BehaviorSignal::FormInteraction);
        assert!(second.lead_score >= first.lead_score);
        assert_eq!(engine.get_score("v1"), Some(second));
    }

    #[test]
    fn test_unclassified_visitor_gets_default_segment() {
        let (engine, _) = engine();
        let score = engine.score(&BehaviorProfile::new("ghost"), None);
        assert_eq!(score.visitor_id, "ghost");
        assert!(score.predicted_ltv >= 0);
        assert!(engine.segment("ghost").is_none());
    }

    #[tokio::test]
    async fn test_snapshot_counts_registered_tests() {
        let (engine, source) = engine();
        engine
            .register_test(TestDefinition::new("x", &[("control", 50), ("a", 50)]))
            .unwrap();
        engine
            .register_test(TestDefinition::new("y", &[("control", 50), ("a", 50)]))
            .unwrap();
        assert!(engine.current_snapshot().is_none());

        source.push(RawCounters {
            visitors: 1000,
            conversions: 50,
            ..Default::default()
        });
        engine.aggregator().run_cycle().await;

        let snapshot = engine.current_snapshot().unwrap();
        assert_eq!(snapshot.active_tests, 2);
        assert_eq!(snapshot.significant_tests, 0);
    }

    #[test]
    fn test_rejects_confidence_level_outside_unit_interval() {
        let source = Arc::new(PushMetricsSource::new(chrono::Duration::minutes(5)));
        let mut config = AppConfig::default();
        config.experiments.confidence_level = 1.0;

        let result = HookEngine::new(&config, source.clone(), noop_sink());
        assert!(matches!(result, Err(HooklabError::Config(_))));

        config.experiments.confidence_level = 0.9;
        assert!(HookEngine::new(&config, source, noop_sink()).is_ok());
    }
}
