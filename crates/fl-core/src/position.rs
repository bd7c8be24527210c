//! Position type representing one telemetry sample from a device

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DeviceId, PositionId};

/// A single decoded position report
///
/// Positions are immutable once created. Besides the fixed fields, decoded
/// protocol data lands in the open attribute map (booleans like `ignition`
/// and `motion`, numerics like `odometer`). The engine never holds a
/// position beyond the one-slot last-position cache per device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Server-assigned identifier
    pub id: PositionId,

    /// The device this position belongs to
    pub device_id: DeviceId,

    /// GPS fix time, monotonically meaningful per device
    pub fix_time: DateTime<Utc>,

    /// Device-level fix-quality flag
    pub valid: bool,

    /// Speed in km/h, non-negative
    pub speed: f64,

    /// Additional decoded attributes
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Position {
    /// Create a new valid position with no attributes and zero speed
    pub fn new(id: PositionId, device_id: DeviceId, fix_time: DateTime<Utc>) -> Self {
        Self {
            id,
            device_id,
            fix_time,
            valid: true,
            speed: 0.0,
            attributes: HashMap::new(),
        }
    }

    /// Set the speed in km/h
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set the fix-quality flag
    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    /// Add a decoded attribute
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Check whether an attribute is present
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Get an attribute value by key, deserialized to the requested type
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a boolean attribute
    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(|v| v.as_bool())
    }

    /// Get a numeric attribute as f64
    pub fn double(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(|v| v.as_f64())
    }

    /// Get a string attribute
    pub fn string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}
