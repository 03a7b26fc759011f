//! Variant assignment — deterministic bucketing backed by an idempotent
//! assignment store, plus conversion tracking and per-test results.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use hooklab_core::event_bus::{make_event, noop_sink, EventSink};
use hooklab_core::{EventType, HooklabError, HooklabResult};

use crate::bucket::bucket;
use crate::significance::{significance_at, SignificanceResult, DEFAULT_CONFIDENCE_LEVEL};
use crate::tally::{ConversionTally, TallyBook};

fn default_goal() -> String {
    "conversion".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSlot {
    pub variant: String,
    pub weight: u32,
}

/// An A/B/n test. `allocation` is walked in order when assigning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub test_id: String,
    pub variants: Vec<String>,
    pub allocation: Vec<AllocationSlot>,
    /// Goal whose events count as conversions for this test.
    #[serde(default = "default_goal")]
    pub goal: String,
}

impl TestDefinition {
    pub fn new(test_id: impl Into<String>, allocation: &[(&str, u32)]) -> Self {
        Self {
            test_id: test_id.into(),
            variants: allocation.iter().map(|(v, _)| v.to_string()).collect(),
            allocation: allocation
                .iter()
                .map(|(v, w)| AllocationSlot {
                    variant: v.to_string(),
                    weight: *w,
                })
                .collect(),
            goal: default_goal(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn control(&self) -> Option<&str> {
        self.variants.first().map(String::as_str)
    }

    pub fn validate(&self) -> HooklabResult<()> {
        if self.test_id.is_empty() {
            return Err(HooklabError::invalid("test id must not be empty"));
        }
        validate_allocation(&self.variants, &self.allocation)
    }
}

fn validate_allocation(variants: &[String], allocation: &[AllocationSlot]) -> HooklabResult<()> {
    if variants.is_empty() {
        return Err(HooklabError::invalid("a test needs at least one variant"));
    }
    if let Some(slot) = allocation.iter().find(|s| !variants.contains(&s.variant)) {
        return Err(HooklabError::invalid(format!(
            "allocation references unknown variant '{}'",
            slot.variant
        )));
    }
    Ok(())
}

/// Pick a variant for a bucket by walking the cumulative allocation.
///
/// When the weights never exceed the bucket (e.g. they sum to less than
/// 100) the first variant is returned.
pub fn select_variant<'a>(
    bucket: u32,
    variants: &'a [String],
    allocation: &'a [AllocationSlot],
) -> &'a str {
    let mut cumulative = 0u32;
    for slot in allocation {
        cumulative = cumulative.saturating_add(slot.weight);
        if cumulative > bucket {
            return &slot.variant;
        }
    }
    &variants[0]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub test_id: String,
    pub visitor_id: String,
    pub variant: String,
    pub assigned_at: DateTime<Utc>,
}

/// Persistence for assignments. `insert_if_absent` must be atomic per
/// (test, visitor): a racing caller gets the record that won.
pub trait AssignmentStore: Send + Sync {
    fn get(&self, test_id: &str, visitor_id: &str) -> Option<Assignment>;

    /// Store `assignment` unless one exists. Returns the stored record and
    /// whether this call created it.
    fn insert_if_absent(&self, assignment: Assignment) -> (Assignment, bool);

    fn for_test(&self, test_id: &str) -> Vec<Assignment>;
}

#[derive(Default)]
pub struct InMemoryAssignmentStore {
    assignments: DashMap<(String, String), Assignment>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl AssignmentStore for InMemoryAssignmentStore {
    fn get(&self, test_id: &str, visitor_id: &str) -> Option<Assignment> {
        self.assignments
            .get(&(test_id.to_string(), visitor_id.to_string()))
            .map(|a| a.clone())
    }

    fn insert_if_absent(&self, assignment: Assignment) -> (Assignment, bool) {
        let key = (assignment.test_id.clone(), assignment.visitor_id.clone());
        match self.assignments.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(existing) => (existing.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(assignment.clone());
                (assignment, true)
            }
        }
    }

    fn for_test(&self, test_id: &str) -> Vec<Assignment> {
        self.assignments
            .iter()
            .filter(|e| e.key().0 == test_id)
            .map(|e| e.value().clone())
            .collect()
    }
}

/// Significance of one variant against control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantComparison {
    pub variant: String,
    pub result: SignificanceResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    pub test_id: String,
    pub control: String,
    pub tallies: Vec<ConversionTally>,
    pub comparisons: Vec<VariantComparison>,
    /// Significant variant with the highest positive lift, if any.
    pub winner: Option<String>,
}

/// Experimentation engine for A/B/n testing.
pub struct ExperimentEngine {
    tests: DashMap<String, TestDefinition>,
    store: Arc<dyn AssignmentStore>,
    tallies: TallyBook,
    event_sink: Arc<dyn EventSink>,
    confidence_level: f64,
}

impl ExperimentEngine {
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        Self {
            tests: DashMap::new(),
            store,
            tallies: TallyBook::new(),
            event_sink: noop_sink(),
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }

    /// Attach an event sink for emitting analytics events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn register_test(&self, definition: TestDefinition) -> HooklabResult<()> {
        definition.validate()?;
        info!(
            test_id = %definition.test_id,
            variants = definition.variants.len(),
            goal = %definition.goal,
            "test registered"
        );
        self.tests.insert(definition.test_id.clone(), definition);
        Ok(())
    }

    pub fn get_test(&self, test_id: &str) -> Option<TestDefinition> {
        self.tests.get(test_id).map(|t| t.clone())
    }

    pub fn list_tests(&self) -> Vec<TestDefinition> {
        self.tests.iter().map(|t| t.value().clone()).collect()
    }

    /// Assign a visitor to a variant of an ad-hoc test definition.
    ///
    /// A stored assignment always wins over recomputation so that a change
    /// of weights mid-test does not move existing visitors.
    pub fn assign(
        &self,
        test_id: &str,
        visitor_id: &str,
        variants: &[String],
        allocation: &[AllocationSlot],
    ) -> HooklabResult<Assignment> {
        if let Some(existing) = self.store.get(test_id, visitor_id) {
            return Ok(existing);
        }
        validate_allocation(variants, allocation)?;

        let b = bucket(&format!("{visitor_id}{test_id}"));
        let variant = select_variant(b, variants, allocation).to_string();

        let (assignment, created) = self.store.insert_if_absent(Assignment {
            test_id: test_id.to_string(),
            visitor_id: visitor_id.to_string(),
            variant,
            assigned_at: Utc::now(),
        });

        if created {
            self.tallies.record_visitor(test_id, &assignment.variant);
            metrics::counter!("experiment.assignments").increment(1);
            self.event_sink.emit(make_event(
                EventType::AbTestAssigned,
                [
                    ("test_id", json!(assignment.test_id)),
                    ("visitor_id", json!(assignment.visitor_id)),
                    ("variant", json!(assignment.variant)),
                    ("bucket", json!(b)),
                ],
            ));
            debug!(
                test_id,
                visitor_id,
                variant = %assignment.variant,
                bucket = b,
                "visitor assigned"
            );
        }

        Ok(assignment)
    }

    /// Assign a visitor to a registered test.
    pub fn assign_registered(&self, test_id: &str, visitor_id: &str) -> HooklabResult<Assignment> {
        let definition = self.registered(test_id)?;
        self.assign(test_id, visitor_id, &definition.variants, &definition.allocation)
    }

    pub fn assignment(&self, test_id: &str, visitor_id: &str) -> Option<Assignment> {
        self.store.get(test_id, visitor_id)
    }

    /// Count a goal event for an assigned visitor.
    ///
    /// Goals other than a registered test's tracked goal are ignored. Each
    /// visitor converts at most once per test. Returns whether the tally
    /// changed.
    pub fn record_conversion(&self, test_id: &str, visitor_id: &str, goal: &str) -> HooklabResult<bool> {
        if let Some(definition) = self.tests.get(test_id) {
            if definition.goal != goal {
                debug!(test_id, goal, tracked = %definition.goal, "goal not tracked by test");
                return Ok(false);
            }
        }
        let assignment = self.store.get(test_id, visitor_id).ok_or_else(|| {
            HooklabError::invalid(format!(
                "visitor '{visitor_id}' has no assignment in test '{test_id}'"
            ))
        })?;

        let counted = self
            .tallies
            .record_conversion(test_id, &assignment.variant, visitor_id);
        if counted {
            metrics::counter!("experiment.conversions").increment(1);
            self.event_sink.emit(make_event(
                EventType::AbTestConversion,
                [
                    ("test_id", json!(test_id)),
                    ("visitor_id", json!(visitor_id)),
                    ("variant", json!(assignment.variant)),
                    ("goal", json!(goal)),
                ],
            ));
        }
        Ok(counted)
    }

    /// Tallies for every variant of a registered test, in variant order.
    pub fn tally(&self, test_id: &str) -> HooklabResult<Vec<ConversionTally>> {
        let definition = self.registered(test_id)?;
        Ok(definition
            .variants
            .iter()
            .map(|v| self.tallies.get(test_id, v))
            .collect())
    }

    /// Compare every variant of a registered test against its control.
    /// Groups without visitors are left out of the comparison.
    pub fn evaluate(&self, test_id: &str) -> HooklabResult<TestResults> {
        let definition = self.registered(test_id)?;
        let tallies = self.tally(test_id)?;
        let control = &tallies[0];

        let mut comparisons = Vec::new();
        if control.visitors > 0 {
            for tally in tallies.iter().skip(1).filter(|t| t.visitors > 0) {
                let result = significance_at(
                    control.conversions,
                    control.visitors,
                    tally.conversions,
                    tally.visitors,
                    self.confidence_level,
                )?;
                comparisons.push(VariantComparison {
                    variant: tally.variant.clone(),
                    result,
                });
            }
        }

        let winner = comparisons
            .iter()
            .filter(|c| c.result.is_significant && c.result.lift > 0.0)
            .max_by(|a, b| a.result.lift.total_cmp(&b.result.lift))
            .map(|c| c.variant.clone());

        Ok(TestResults {
            test_id: test_id.to_string(),
            control: definition.variants[0].clone(),
            tallies,
            comparisons,
            winner,
        })
    }

    fn registered(&self, test_id: &str) -> HooklabResult<TestDefinition> {
        self.get_test(test_id)
            .ok_or_else(|| HooklabError::invalid(format!("unknown test '{test_id}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hooklab_core::event_bus::capture_sink;

    fn engine() -> ExperimentEngine {
        ExperimentEngine::new(Arc::new(InMemoryAssignmentStore::new()))
    }

    fn slots(pairs: &[(&str, u32)]) -> (Vec<String>, Vec<AllocationSlot>) {
        let def = TestDefinition::new("t", pairs);
        (def.variants, def.allocation)
    }

    #[test]
    fn test_select_variant_ranges() {
        let (variants, allocation) = slots(&[("control", 50), ("a", 50)]);
        assert_eq!(select_variant(0, &variants, &allocation), "control");
        assert_eq!(select_variant(49, &variants, &allocation), "control");
        assert_eq!(select_variant(50, &variants, &allocation), "a");
        assert_eq!(select_variant(99, &variants, &allocation), "a");
    }

    #[test]
    fn test_under_allocation_falls_back_to_first_variant() {
        let (variants, allocation) = slots(&[("control", 30), ("a", 30)]);
        assert_eq!(select_variant(75, &variants, &allocation), "control");
        assert_eq!(select_variant(45, &variants, &allocation), "a");
    }

    #[test]
    fn test_fallback_follows_variant_order_not_allocation_order() {
        let variants = vec!["control".to_string(), "a".to_string()];
        let allocation = vec![AllocationSlot {
            variant: "a".into(),
            weight: 10,
        }];
        assert_eq!(select_variant(5, &variants, &allocation), "a");
        assert_eq!(select_variant(50, &variants, &allocation), "control");
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let engine = engine();
        let (variants, allocation) = slots(&[("control", 34), ("a", 33), ("b", 33)]);
        for i in 0..50 {
            let visitor = format!("visitor-{i}");
            let first = engine.assign("x", &visitor, &variants, &allocation).unwrap();
            let second = engine.assign("x", &visitor, &variants, &allocation).unwrap();
            assert_eq!(first, second);
        }
        // Bucket is pure: a fresh engine derives the same variants.
        let other = ExperimentEngine::new(Arc::new(InMemoryAssignmentStore::new()));
        let a = engine.assign("x", "visitor-7", &variants, &allocation).unwrap();
        let b = other.assign("x", "visitor-7", &variants, &allocation).unwrap();
        assert_eq!(a.variant, b.variant);
    }

    #[test]
    fn test_stored_assignment_survives_weight_change() {
        let engine = engine();
        let (variants, allocation) = slots(&[("control", 34), ("a", 33), ("b", 33)]);
        let original = engine.assign("x", "u1", &variants, &allocation).unwrap();
        assert_eq!(original.variant, "b");

        let (_, shifted) = slots(&[("control", 100), ("a", 0), ("b", 0)]);
        let again = engine.assign("x", "u1", &variants, &shifted).unwrap();
        assert_eq!(again.variant, "b");
    }

    #[test]
    fn test_assignment_emits_once_and_counts_visitor_once() {
        let sink = capture_sink();
        let engine = engine().with_event_sink(sink.clone());
        engine
            .register_test(TestDefinition::new("x", &[("control", 34), ("a", 33), ("b", 33)]))
            .unwrap();

        engine.assign_registered("x", "u1").unwrap();
        engine.assign_registered("x", "u1").unwrap();

        assert_eq!(sink.count_type(EventType::AbTestAssigned), 1);
        let tallies = engine.tally("x").unwrap();
        assert_eq!(tallies.iter().map(|t| t.visitors).sum::<u64>(), 1);
        let event = &sink.events()[0];
        assert_eq!(event.property("variant"), Some(&json!("b")));
    }

    #[test]
    fn test_concurrent_assign_creates_one_record() {
        let store = Arc::new(InMemoryAssignmentStore::new());
        let engine = Arc::new(ExperimentEngine::new(store.clone()));
        engine
            .register_test(TestDefinition::new("race", &[("control", 50), ("a", 50)]))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.assign_registered("race", "u1").unwrap())
            })
            .collect();
        let results: Vec<Assignment> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len(), 1);
        let visitors: u64 = engine.tally("race").unwrap().iter().map(|t| t.visitors).sum();
        assert_eq!(visitors, 1);
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let engine = engine();
        let empty = TestDefinition {
            test_id: "empty".into(),
            variants: vec![],
            allocation: vec![],
            goal: default_goal(),
        };
        assert!(engine.register_test(empty).is_err());

        let mut unknown = TestDefinition::new("unknown", &[("control", 50)]);
        unknown.allocation.push(AllocationSlot {
            variant: "ghost".into(),
            weight: 50,
        });
        assert!(matches!(
            engine.register_test(unknown),
            Err(HooklabError::InvalidInput(_))
        ));

        assert!(engine.assign_registered("missing", "u1").is_err());
    }

    #[test]
    fn test_conversion_counted_once_per_visitor() {
        let sink = capture_sink();
        let engine = engine().with_event_sink(sink.clone());
        engine
            .register_test(TestDefinition::new("x", &[("control", 34), ("a", 33), ("b", 33)]))
            .unwrap();
        let assignment = engine.assign_registered("x", "u1").unwrap();

        assert!(engine.record_conversion("x", "u1", "conversion").unwrap());
        assert!(!engine.record_conversion("x", "u1", "conversion").unwrap());

        let tally = engine
            .tally("x")
            .unwrap()
            .into_iter()
            .find(|t| t.variant == assignment.variant)
            .unwrap();
        assert_eq!(tally.conversions, 1);
        assert_eq!(sink.count_type(EventType::AbTestConversion), 1);
    }

    #[test]
    fn test_untracked_goal_and_unassigned_visitor() {
        let engine = engine();
        engine
            .register_test(TestDefinition::new("x", &[("control", 50), ("a", 50)]).with_goal("signup"))
            .unwrap();
        engine.assign_registered("x", "u1").unwrap();

        assert!(!engine.record_conversion("x", "u1", "click").unwrap());
        assert!(engine.record_conversion("x", "u2", "signup").is_err());
        assert!(engine.record_conversion("x", "u1", "signup").unwrap());
    }

    #[test]
    fn test_evaluate_reports_comparisons() {
        let engine = engine();
        engine
            .register_test(TestDefinition::new("hero", &[("control", 50), ("a", 50)]))
            .unwrap();
        for i in 0..400 {
            let visitor = format!("v{i}");
            let assignment = engine.assign_registered("hero", &visitor).unwrap();
            // variant "a" converts far more often than control
            let converts = if assignment.variant == "a" { i % 3 == 0 } else { i % 20 == 0 };
            if converts {
                engine.record_conversion("hero", &visitor, "conversion").unwrap();
            }
        }

        let results = engine.evaluate("hero").unwrap();
        assert_eq!(results.control, "control");
        assert_eq!(results.tallies.len(), 2);
        assert_eq!(results.comparisons.len(), 1);
        assert!(results.comparisons[0].result.lift > 0.0);
        assert_eq!(results.winner.as_deref(), Some("a"));
    }

    #[test]
    fn test_evaluate_skips_empty_groups() {
        let engine = engine();
        engine
            .register_test(TestDefinition::new("quiet", &[("control", 50), ("a", 50)]))
            .unwrap();
        let results = engine.evaluate("quiet").unwrap();
        assert!(results.comparisons.is_empty());
        assert!(results.winner.is_none());
    }
}
