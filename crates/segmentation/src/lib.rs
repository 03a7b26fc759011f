//! Visitor segmentation — classifies a [`VisitorContext`] into traffic
//! source, creator persona, device and geo segments.
//!
//! Every classifier is a pure function of its inputs; only
//! [`SegmentationEngine`] holds state (the per-visitor segment store).
//!
//! [`VisitorContext`]: hooklab_core::types::VisitorContext

#![warn(clippy::unwrap_used)]

pub mod device;
pub mod engine;
pub mod geo;
pub mod persona;
pub mod traffic;

pub use device::classify_device;
pub use engine::{classify, SegmentationEngine};
pub use geo::classify_geo;
pub use persona::classify_persona;
pub use traffic::classify_traffic_source;
