//! Broadcast pub/sub bus for detected FleetLink events
//!
//! Downstream consumers (notification relays, recorders, websocket feeds)
//! subscribe here, either to one event type or to everything. The engine
//! fires detected events onto the bus through its sink and never waits for
//! consumers; delivery guarantees end at the channel boundary.

use std::sync::Arc;

use dashmap::DashMap;
use fl_core::{Event, EventType};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to detected events
///
/// Supports subscribing to a specific event type or to all events. Firing
/// an event delivers it to both subscriber sets. Slow consumers lag and
/// lose events rather than backpressure the engine.
pub struct EventBus {
    /// Map of event types to their broadcast senders
    listeners: DashMap<EventType, broadcast::Sender<Event>>,
    /// Sender for subscribe-all consumers
    all_sender: broadcast::Sender<Event>,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            all_sender,
            capacity,
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<Event> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "subscribing to event type");

        self.listeners
            .entry(event_type)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to all events
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.all_sender.subscribe()
    }

    /// Fire an event to all subscribers
    pub fn fire(&self, event: Event) {
        debug!(
            event_type = %event.event_type,
            device_id = %event.device_id,
            "firing event"
        );

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // Send errors just mean no active receivers
            let _ = sender.send(event.clone());
        }

        let _ = self.all_sender.send(event);
    }

    /// Number of event types with at least one subscription
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fl_core::{events, DeviceId, Position, PositionId};

    fn sample_event(event_type: &str, device: u64) -> Event {
        let position = Position::new(PositionId::new(1), DeviceId::new(device), Utc::now());
        Event::new(event_type, &position)
    }

    #[tokio::test]
    async fn subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(events::IGNITION_ON);

        bus.fire(sample_event(events::IGNITION_ON, 3));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), events::IGNITION_ON);
        assert_eq!(received.device_id, DeviceId::new(3));
    }

    #[tokio::test]
    async fn subscribe_all_sees_every_type() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_all();

        bus.fire(sample_event(events::IGNITION_ON, 1));
        bus.fire(sample_event(events::PARKING_MODE_ALERT, 1));

        assert_eq!(
            rx.recv().await.unwrap().event_type.as_str(),
            events::IGNITION_ON
        );
        assert_eq!(
            rx.recv().await.unwrap().event_type.as_str(),
            events::PARKING_MODE_ALERT
        );
    }

    #[tokio::test]
    async fn no_cross_type_pollution() {
        let bus = EventBus::new();
        let mut rx_ignition = bus.subscribe(events::IGNITION_ON);
        let mut rx_parking = bus.subscribe(events::PARKING_MODE_ALERT);

        bus.fire(sample_event(events::IGNITION_ON, 1));

        assert!(rx_ignition.try_recv().is_ok());
        assert!(rx_parking.try_recv().is_err());
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe(events::DEVICE_MOVING);
        let mut rx2 = bus.subscribe(events::DEVICE_MOVING);

        bus.fire(sample_event(events::DEVICE_MOVING, 9));

        assert_eq!(rx1.recv().await.unwrap().device_id, DeviceId::new(9));
        assert_eq!(rx2.recv().await.unwrap().device_id, DeviceId::new(9));
    }

    #[test]
    fn fire_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.fire(sample_event(events::DEVICE_STOPPED, 1));
        assert_eq!(bus.listener_count(), 0);
    }
}
