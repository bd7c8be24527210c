//! Core types for FleetLink
//!
//! This crate provides the fundamental types used throughout the FleetLink
//! event engine: DeviceId, Position, Device, Event, and the standard
//! attribute and event-type constants.

mod device;
mod event;
mod ids;
mod position;

pub use device::{Device, DeviceStatus, Group};
pub use event::{Event, EventType};
pub use ids::{DeviceId, GroupId, PositionId};
pub use position::Position;

/// Standard position attribute keys
///
/// Decoded protocol frames populate the open attribute map with these keys;
/// the event handlers only ever read them.
pub mod attr {
    /// Engine ignition state (boolean)
    pub const KEY_IGNITION: &str = "ignition";

    /// Device-reported motion state (boolean)
    pub const KEY_MOTION: &str = "motion";

    /// Door state (boolean or bitmask, device dependent)
    pub const KEY_DOOR: &str = "door";

    /// Alarm tag reported by the device (string, possibly comma separated)
    pub const KEY_ALARM: &str = "alarm";

    /// Odometer reading in meters (numeric)
    pub const KEY_ODOMETER: &str = "odometer";

    /// Accumulated distance in meters (numeric)
    pub const KEY_TOTAL_DISTANCE: &str = "totalDistance";

    /// Engine hours (numeric)
    pub const KEY_HOURS: &str = "hours";

    /// Alarm tag value for a device-signalled parking alarm
    pub const ALARM_PARKING: &str = "parking";
}

/// Standard event types emitted by the engine
pub mod events {
    /// Ignition switched on
    pub const IGNITION_ON: &str = "ignitionOn";

    /// Ignition switched off
    pub const IGNITION_OFF: &str = "ignitionOff";

    /// Unauthorized activity while the device is in parking mode
    pub const PARKING_MODE_ALERT: &str = "parkingModeAlert";

    /// Device started moving
    pub const DEVICE_MOVING: &str = "deviceMoving";

    /// Device stopped moving
    pub const DEVICE_STOPPED: &str = "deviceStopped";
}
