//! Event sinks: where detected events go

use std::sync::Mutex;

use fl_core::Event;
use fl_event_bus::SharedEventBus;
use tracing::trace;

/// Consumer of detected events
///
/// Fire-and-forget from the engine's perspective: delivery guarantees
/// belong to the sink, not to the engine. Implementations must not block;
/// dispatch runs on the ingestion path.
pub trait EventSink: Send + Sync {
    /// Take ownership of a detected event
    fn accept(&self, event: Event);
}

/// Sink that discards every event
///
/// The default when a dispatcher is built without a sink; dispatch still
/// returns the detected events to its caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn accept(&self, event: Event) {
        trace!(event_type = %event.event_type, "discarding event");
    }
}

/// Sink that forwards events onto the broadcast bus
pub struct BusSink {
    bus: SharedEventBus,
}

impl BusSink {
    /// Create a sink over a shared event bus
    pub fn new(bus: SharedEventBus) -> Self {
        Self { bus }
    }
}

impl EventSink for BusSink {
    fn accept(&self, event: Event) {
        self.bus.fire(event);
    }
}

/// Sink that buffers events in memory
///
/// Used by tests to assert on emitted events; also handy for batching
/// consumers that drain on their own schedule.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything accepted so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drain and return everything accepted so far
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl EventSink for CollectingSink {
    fn accept(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
