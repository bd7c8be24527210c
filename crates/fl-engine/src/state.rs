//! Per-device ephemeral state for handlers

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fl_core::DeviceId;

/// Per-device record map for one handler
///
/// Each handler owns one store; records for different handlers never
/// share a map. Records are created lazily on the first accepted position
/// for a device and live only for the process lifetime. The dispatcher's
/// per-device lock guarantees that reads and writes for one device never
/// race; the map itself makes cross-device access safe.
pub struct HandlerStateStore<S> {
    records: DashMap<DeviceId, S>,
}

impl<S> HandlerStateStore<S> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Replace or create the record for a device
    pub fn set(&self, device_id: DeviceId, record: S) {
        self.records.insert(device_id, record);
    }

    /// Apply a mutation to an existing record; returns false if absent
    pub fn modify(&self, device_id: DeviceId, f: impl FnOnce(&mut S)) -> bool {
        match self.records.get_mut(&device_id) {
            Some(mut record) => {
                f(&mut record);
                true
            }
            None => false,
        }
    }

    /// Drop the record for a device
    pub fn remove(&self, device_id: DeviceId) -> Option<S> {
        self.records.remove(&device_id).map(|(_, s)| s)
    }

    /// Number of devices with a record
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no device has a record yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<S: Clone> HandlerStateStore<S> {
    /// Get a copy of the record for a device
    pub fn get(&self, device_id: DeviceId) -> Option<S> {
        self.records.get(&device_id).map(|s| s.clone())
    }
}

impl<S> Default for HandlerStateStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ignition handler memory: the last emitted event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IgnitionState {
    /// Fix time of the position that produced the last ignition event
    pub last_event_time: DateTime<Utc>,
    /// Ignition value the last event reported
    pub last_event_state: bool,
}

/// Motion handler memory: the last observed motion state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionState {
    /// Whether the device was last seen moving
    pub moving: bool,
}
