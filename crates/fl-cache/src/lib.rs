//! Device and last-position cache for FleetLink
//!
//! The cache holds the latest known device object and the latest accepted
//! position per device, and answers the "is this position the newest for
//! its device" question the staleness filter is built on. The engine never
//! persists anything; durable storage belongs to an outer layer that keeps
//! this cache populated.

use std::sync::Arc;

use dashmap::DashMap;
use fl_attributes::AttributeSource;
use fl_core::{Device, DeviceId, Group, GroupId, Position};
use tracing::{debug, trace};

/// Read/write access to cached devices, groups, and last positions
///
/// `is_latest` is the staleness contract: a position is latest when the
/// device has no cached predecessor, when its fix time is strictly newer,
/// or when fix times tie and its server-assigned id is strictly higher.
pub trait DeviceCache: Send + Sync {
    /// Get the cached device, if known
    fn device(&self, id: DeviceId) -> Option<Device>;

    /// Get a cached group, if known
    fn group(&self, id: GroupId) -> Option<Group>;

    /// Get the latest accepted position for a device
    fn last_position(&self, device_id: DeviceId) -> Option<Position>;

    /// Check whether a position is the newest for its device
    fn is_latest(&self, position: &Position) -> bool {
        match self.last_position(position.device_id) {
            None => true,
            Some(last) => {
                position.fix_time > last.fix_time
                    || (position.fix_time == last.fix_time && position.id > last.id)
            }
        }
    }

    /// Record a position as the device's latest
    fn update_position(&self, position: Position);
}

/// In-memory cache backed by concurrent maps
///
/// Also serves as the [`AttributeSource`] for the resolver: device-level
/// overrides come from the cached device, group-level from the device's
/// group, server-level from a flat attribute map.
#[derive(Default)]
pub struct MemoryCache {
    devices: DashMap<DeviceId, Device>,
    groups: DashMap<GroupId, Group>,
    positions: DashMap<DeviceId, Position>,
    server_attributes: DashMap<String, serde_json::Value>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a device
    pub fn put_device(&self, device: Device) {
        trace!(device_id = %device.id, name = %device.name, "caching device");
        self.devices.insert(device.id, device);
    }

    /// Remove a device and its cached position
    pub fn remove_device(&self, id: DeviceId) -> Option<Device> {
        self.positions.remove(&id);
        self.devices.remove(&id).map(|(_, d)| d)
    }

    /// Insert or replace a group
    pub fn put_group(&self, group: Group) {
        self.groups.insert(group.id, group);
    }

    /// Set a server-wide attribute
    pub fn set_server_attribute(&self, key: impl Into<String>, value: serde_json::Value) {
        self.server_attributes.insert(key.into(), value);
    }

    /// Number of cached devices
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl DeviceCache for MemoryCache {
    fn device(&self, id: DeviceId) -> Option<Device> {
        self.devices.get(&id).map(|d| d.clone())
    }

    fn group(&self, id: GroupId) -> Option<Group> {
        self.groups.get(&id).map(|g| g.clone())
    }

    fn last_position(&self, device_id: DeviceId) -> Option<Position> {
        self.positions.get(&device_id).map(|p| p.clone())
    }

    fn update_position(&self, position: Position) {
        debug!(
            device_id = %position.device_id,
            position_id = %position.id,
            fix_time = %position.fix_time,
            "updating last position"
        );
        self.positions.insert(position.device_id, position);
    }
}

impl AttributeSource for MemoryCache {
    fn device_attribute(&self, device_id: DeviceId, key: &str) -> Option<serde_json::Value> {
        self.devices
            .get(&device_id)
            .and_then(|d| d.attributes.get(key).cloned())
    }

    fn group_attribute(&self, device_id: DeviceId, key: &str) -> Option<serde_json::Value> {
        let group_id = self.devices.get(&device_id).and_then(|d| d.group_id)?;
        self.groups
            .get(&group_id)
            .and_then(|g| g.attributes.get(key).cloned())
    }

    fn server_attribute(&self, key: &str) -> Option<serde_json::Value> {
        self.server_attributes.get(key).map(|v| v.clone())
    }
}

/// Thread-safe wrapper for MemoryCache
pub type SharedMemoryCache = Arc<MemoryCache>;
