//! Dashboard health monitoring — pulls raw counters, derives metrics
//! snapshots, evaluates threshold rules and keeps a bounded alert log.
//!
//! # Modules
//!
//! - [`source`] — the metrics-source seam and a push-fed implementation
//! - [`snapshot`] — counter → snapshot derivation
//! - [`rules`] — pure rule evaluation
//! - [`alerts`] — rolling alert log
//! - [`aggregator`] — the periodic evaluation loop

#![warn(clippy::unwrap_used)]

pub mod aggregator;
pub mod alerts;
pub mod rules;
pub mod snapshot;
pub mod source;

pub use aggregator::{AggregatorState, CycleOutcome, MetricsAggregator};
pub use alerts::AlertLog;
pub use snapshot::derive_snapshot;
pub use source::{MetricsSource, PushMetricsSource};
