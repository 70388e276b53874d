use thiserror::Error;

use crate::types::EntityId;

/// Failures of the streaming engine.
///
/// Missing live instances are not errors: lookups return `None` and teardown of an
/// instance that vanished externally only logs a warning.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// Attach/detach or reference-count misuse. Always a caller defect.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// Eviction was required but nothing was parked for reuse. `max_visible` is too
    /// low for the demand of the connected observers.
    #[error("all {max_visible} live slots are referenced and none can be reclaimed")]
    CapacityExhausted { max_visible: usize },
    #[error("entity {0:?} does not exist")]
    UnknownEntity(EntityId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}
