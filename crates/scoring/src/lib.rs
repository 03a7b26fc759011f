//! Predictive scoring — fixed-formula heuristics over behavioral signals.
//!
//! - [`model`] — lead score, conversion probability and lifetime value
//! - [`churn`] — trial churn risk
//! - [`signals`] — engagement features derived from a behavior profile
//! - [`engine`] — behavior/score stores that rescore on every update

#![warn(clippy::unwrap_used)]

pub mod churn;
pub mod engine;
pub mod model;
pub mod signals;

pub use churn::churn_risk;
pub use engine::ScoringEngine;
pub use model::ScoringModel;
pub use signals::EngagementSignals;
