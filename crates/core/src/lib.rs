//! Shared building blocks for the hooklab experimentation and scoring engine:
//! domain types, the error taxonomy, configuration, and the event bus.

pub mod config;
pub mod error;
pub mod event_bus;
pub mod types;

pub use config::AppConfig;
pub use error::{HooklabError, HooklabResult};
pub use event_bus::{EventSink, EventType};
