use thiserror::Error;

pub type HooklabResult<T> = Result<T, HooklabError>;

#[derive(Error, Debug)]
pub enum HooklabError {
    /// Malformed test definitions, zero-visitor significance inputs and
    /// similar caller mistakes. Never silently coerced.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external metrics source could not produce counters this cycle.
    #[error("Metrics source unavailable: {0}")]
    MetricsUnavailable(String),

    /// The event sink rejected or could not accept an event.
    #[error("Event sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Unreadable or out-of-range configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HooklabError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether the condition only degrades freshness (stale snapshot, lost
    /// analytics event) rather than indicating a caller bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MetricsUnavailable(_) | Self::SinkUnavailable(_)
        )
    }
}

impl From<config::ConfigError> for HooklabError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
