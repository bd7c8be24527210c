//! Event types emitted by the detection engine

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{DeviceId, Position, PositionId};

/// Event type identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    /// Create a new event type
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    /// Get the event type as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A semantic event detected from a device's position stream
///
/// Events are immutable once emitted; ownership transfers to the sink.
/// The back-reference to the originating position is carried as
/// `device_id`, `position_id`, and `event_time` (the position's fix time).
/// The attribute map holds diagnostic fields describing why the event
/// fired (deltas, previous values, a human-readable message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (ULID)
    pub id: String,

    /// The type of event
    pub event_type: EventType,

    /// The device the event belongs to
    pub device_id: DeviceId,

    /// The position that triggered the event
    pub position_id: PositionId,

    /// When the event happened (the originating position's fix time)
    pub event_time: DateTime<Utc>,

    /// Diagnostic attributes
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event referencing the originating position
    pub fn new(event_type: impl Into<EventType>, position: &Position) -> Self {
        Self {
            id: Ulid::new().to_string(),
            event_type: event_type.into(),
            device_id: position.device_id,
            position_id: position.id,
            event_time: position.fix_time,
            attributes: HashMap::new(),
        }
    }

    /// Add a diagnostic attribute
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Get a diagnostic attribute, deserialized to the requested type
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;

    #[test]
    fn event_references_originating_position() {
        let position = Position::new(PositionId::new(10), DeviceId::new(3), Utc::now());
        let event = Event::new(events::IGNITION_ON, &position)
            .with_attribute("message", "test");

        assert_eq!(event.event_type.as_str(), events::IGNITION_ON);
        assert_eq!(event.device_id, position.device_id);
        assert_eq!(event.position_id, position.id);
        assert_eq!(event.event_time, position.fix_time);
        assert_eq!(event.attribute::<String>("message").as_deref(), Some("test"));
    }

    #[test]
    fn event_ids_are_unique() {
        let position = Position::new(PositionId::new(1), DeviceId::new(1), Utc::now());
        let a = Event::new(events::DEVICE_MOVING, &position);
        let b = Event::new(events::DEVICE_MOVING, &position);
        assert_ne!(a.id, b.id);
    }
}
