//! The handler chain: feeds accepted positions to every handler in order

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use fl_attributes::AttributeResolver;
use fl_cache::DeviceCache;
use fl_core::{DeviceId, Event, Position};
use tracing::{debug, instrument, warn};

use crate::filter::PositionFilter;
use crate::handler::EventHandler;
use crate::ignition::IgnitionHandler;
use crate::motion::MotionHandler;
use crate::parking::ParkingModeHandler;
use crate::sink::{EventSink, NullSink};

/// Feeds each accepted position to every registered handler in a fixed
/// order and forwards the detected events to the sink
///
/// Handler output order is deterministic: events append in handler
/// registration order, and within one handler in its rule-evaluation
/// order. A faulting handler is isolated and contributes zero events;
/// event detection is best-effort enrichment, never the reason a position
/// fails to flow.
///
/// Dispatches for one device are serialized by a per-device lock, so
/// handler state mutations are read-modify-write safe. Different devices
/// dispatch concurrently without contention.
pub struct Dispatcher {
    cache: Arc<dyn DeviceCache>,
    filter: PositionFilter,
    handlers: Vec<Arc<dyn EventHandler>>,
    sink: Arc<dyn EventSink>,
    locks: DashMap<DeviceId, Arc<Mutex<()>>>,
}

impl Dispatcher {
    /// Start building a dispatcher over a device cache
    pub fn builder(cache: Arc<dyn DeviceCache>) -> DispatcherBuilder {
        DispatcherBuilder {
            filter: PositionFilter::new(cache.clone()),
            cache,
            handlers: Vec::new(),
            sink: None,
        }
    }

    /// Run one position through the handler chain
    ///
    /// Returns the detected events after forwarding them to the sink. A
    /// stale, duplicate, or unknown-device position is rejected before
    /// any handler runs: no events, no state mutation, no cache update.
    #[instrument(
        skip(self, position),
        fields(device_id = %position.device_id, position_id = %position.id)
    )]
    pub fn dispatch(&self, position: Position) -> Vec<Event> {
        let lock = self.device_lock(position.device_id);
        let _guard = lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !self.filter.accept(&position) {
            debug!("position rejected, skipping handlers");
            return Vec::new();
        }

        let mut detected = Vec::new();
        for handler in &self.handlers {
            match handler.on_position(&position) {
                Ok(events) => detected.extend(events),
                Err(error) => {
                    warn!(
                        handler = handler.name(),
                        %error,
                        "handler failed, continuing with remaining handlers"
                    );
                }
            }
        }

        // Handlers saw the predecessor; only now does this position
        // become the device's latest
        self.cache.update_position(position);

        for event in &detected {
            self.sink.accept(event.clone());
        }
        detected
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn device_lock(&self, device_id: DeviceId) -> Arc<Mutex<()>> {
        self.locks.entry(device_id).or_default().clone()
    }
}

/// Builder for [`Dispatcher`]
pub struct DispatcherBuilder {
    cache: Arc<dyn DeviceCache>,
    filter: PositionFilter,
    handlers: Vec<Arc<dyn EventHandler>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl DispatcherBuilder {
    /// Register a handler; handlers run in registration order
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Register the three canonical handlers: ignition, parking mode,
    /// motion
    pub fn with_default_handlers(self, resolver: AttributeResolver) -> Self {
        let cache = self.cache.clone();
        self.with_handler(Arc::new(IgnitionHandler::new(
            cache.clone(),
            resolver.clone(),
        )))
        .with_handler(Arc::new(ParkingModeHandler::new(
            cache.clone(),
            resolver.clone(),
        )))
        .with_handler(Arc::new(MotionHandler::new(cache, resolver)))
    }

    /// Set the event sink; defaults to [`NullSink`]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the dispatcher
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            cache: self.cache,
            filter: self.filter,
            handlers: self.handlers,
            sink: self.sink.unwrap_or_else(|| Arc::new(NullSink)),
            locks: DashMap::new(),
        }
    }
}
