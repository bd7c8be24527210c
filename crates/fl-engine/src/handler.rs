//! The event handler contract

use fl_core::{Event, Position};
use thiserror::Error;

/// Unexpected failure during one handler's evaluation
///
/// Rejected input (stale, duplicate, or invalid positions) is not an
/// error; handlers return an empty event list for it. This type covers
/// genuinely unexpected faults, so the dispatcher can isolate a
/// misbehaving handler without aborting the rest of the chain.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("failed to encode diagnostic attribute: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for handler evaluation
pub type HandlerResult<T> = Result<T, HandlerError>;

/// A single event-detection rule
///
/// Handlers are independent: one handler's output never feeds another's
/// input, and each keeps its own per-device state. Implementations must
/// be safe for concurrent calls across devices; the dispatcher serializes
/// calls for any one device.
pub trait EventHandler: Send + Sync {
    /// Stable name, used in logs when a handler is isolated after a fault
    fn name(&self) -> &'static str;

    /// Evaluate one position, producing zero or more events
    ///
    /// Called before the position replaces the device's cached last
    /// position, so the cache still holds the predecessor for delta
    /// computations.
    fn on_position(&self, position: &Position) -> HandlerResult<Vec<Event>>;
}
