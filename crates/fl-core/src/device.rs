//! Device and group entities

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{DeviceId, GroupId};

/// Connection status of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

/// A tracked device
///
/// Read-only from the engine's perspective; owned by the external cache.
/// The attribute map carries device-level configuration overrides consumed
/// by the attribute resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Unique identifier
    pub id: DeviceId,

    /// Human-readable name
    pub name: String,

    /// Group membership, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,

    /// Connection status
    #[serde(default)]
    pub status: DeviceStatus,

    /// Device-level configuration overrides
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Device {
    /// Create a new device with no group and no overrides
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            group_id: None,
            status: DeviceStatus::default(),
            attributes: HashMap::new(),
        }
    }

    /// Assign the device to a group
    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Set the connection status
    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    /// Add a device-level configuration override
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A group of devices, carrying group-level configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier
    pub id: GroupId,

    /// Human-readable name
    pub name: String,

    /// Group-level configuration overrides
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Group {
    /// Create a new group with no overrides
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    /// Add a group-level configuration override
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
