//! Analytics event delivery. Engines emit into a [`QueuedEventSink`], which
//! buffers events in a bounded channel and forwards them in batches to an
//! [`EventTransport`].

#![warn(clippy::unwrap_used)]

pub mod queue;
pub mod transport;

pub use queue::QueuedEventSink;
pub use transport::{EventTransport, LogTransport};
