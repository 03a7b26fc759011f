//! Experimentation engine — deterministic A/B/n bucketing, idempotent
//! variant assignment, conversion tallies and significance testing.
//!
//! # Modules
//!
//! - [`bucket`] — stable identity → bucket hash
//! - [`assignment`] — test definitions, assignment store and engine
//! - [`tally`] — per-variant visitor/conversion counters with dedup
//! - [`significance`] — two-proportion z-test

#![warn(clippy::unwrap_used)]

pub mod assignment;
pub mod bucket;
pub mod significance;
pub mod tally;

pub use assignment::{
    AllocationSlot, Assignment, AssignmentStore, ExperimentEngine, InMemoryAssignmentStore,
    TestDefinition, TestResults,
};
pub use bucket::bucket;
pub use significance::{significance, SignificanceResult};
pub use tally::ConversionTally;
