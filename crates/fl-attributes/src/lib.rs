//! Cascading configuration attribute resolution for FleetLink
//!
//! Configuration values cascade through four levels: a device-level
//! override, the device's group, server-wide attributes, and finally the
//! compiled-in default carried by each typed key. Handlers look values up
//! through [`AttributeResolver`] and never reach into a global config
//! singleton, which also makes per-test threshold injection trivial.

use std::sync::Arc;

use fl_core::DeviceId;
use thiserror::Error;
use tracing::debug;

/// Error raised by startup validation of server-level attributes
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverConfigError {
    #[error("server attribute '{key}' is not a valid {expected}")]
    InvalidServerValue {
        key: &'static str,
        expected: &'static str,
    },
}

/// A typed configuration key with a compiled-in default
///
/// Every key the engine queries carries a default, so resolution is
/// infallible at position time. A missing or malformed override simply
/// falls through to the next level.
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey<T> {
    name: &'static str,
    default: T,
}

impl<T: Copy> ConfigKey<T> {
    /// Define a key with its compiled-in default
    pub const fn new(name: &'static str, default: T) -> Self {
        Self { name, default }
    }

    /// The attribute name this key resolves against
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The compiled-in default
    pub const fn default_value(&self) -> T {
        self.default
    }
}

/// Configuration keys consumed by the event engine
pub mod keys {
    use super::ConfigKey;

    /// Minimum time between ignition events for one device, in milliseconds
    pub const IGNITION_DEBOUNCE_TIME: ConfigKey<i64> =
        ConfigKey::new("event.ignition.debounceTime", 30_000);

    /// Speed below which a device counts as parked, and the minimum speed
    /// jump that counts as unauthorized movement, in km/h
    pub const PARKING_SPEED_THRESHOLD: ConfigKey<f64> =
        ConfigKey::new("event.parkingMode.speedThreshold", 5.0);

    /// Window within which a speed jump counts as sudden, in milliseconds
    pub const PARKING_TIME_THRESHOLD: ConfigKey<i64> =
        ConfigKey::new("event.parkingMode.timeThreshold", 60_000);

    /// Whether parking mode is active for a device
    pub const PARKING_MODE_ENABLED: ConfigKey<bool> =
        ConfigKey::new("event.parkingMode.enabled", false);

    /// Whether handlers evaluate positions without a valid fix
    pub const PROCESS_INVALID_POSITIONS: ConfigKey<bool> =
        ConfigKey::new("event.processInvalidPositions", false);

    /// Speed above which a device counts as moving when it reports no
    /// motion attribute, in km/h
    pub const MOTION_SPEED_THRESHOLD: ConfigKey<f64> =
        ConfigKey::new("event.motion.speedThreshold", 0.0);
}

/// Conversion from a raw attribute value to a typed configuration value
///
/// Device payloads often carry numeric and boolean overrides as strings,
/// so string forms are accepted alongside the native JSON type.
pub trait AttributeValue: Sized + Copy {
    /// Human-readable type name, used in validation errors
    const TYPE_NAME: &'static str;

    /// Parse a raw attribute value; `None` means the wrong type
    fn from_attribute(value: &serde_json::Value) -> Option<Self>;
}

impl AttributeValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_attribute(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl AttributeValue for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn from_attribute(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl AttributeValue for f64 {
    const TYPE_NAME: &'static str = "number";

    fn from_attribute(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Provider of raw attribute values at each cascade level
///
/// The device cache implements this; the resolver stays decoupled from
/// how devices, groups, and server settings are stored.
pub trait AttributeSource: Send + Sync {
    /// Device-level override for `key`, if any
    fn device_attribute(&self, device_id: DeviceId, key: &str) -> Option<serde_json::Value>;

    /// Group-level override for `key` on the device's group, if any
    fn group_attribute(&self, device_id: DeviceId, key: &str) -> Option<serde_json::Value>;

    /// Server-wide value for `key`, if any
    fn server_attribute(&self, key: &str) -> Option<serde_json::Value>;
}

/// Resolves typed configuration values for a device
///
/// Deterministic and side-effect-free: the same `(key, device_id)` pair
/// always resolves to the same value for an unchanged source.
#[derive(Clone)]
pub struct AttributeResolver {
    source: Arc<dyn AttributeSource>,
}

impl AttributeResolver {
    /// Create a resolver over an attribute source
    pub fn new(source: Arc<dyn AttributeSource>) -> Self {
        Self { source }
    }

    /// Resolve a configuration value for a device
    ///
    /// Checks device, group, and server levels in that order; a level
    /// whose value fails to parse as `T` is skipped. Falls back to the
    /// key's compiled-in default.
    pub fn lookup<T: AttributeValue>(&self, key: &ConfigKey<T>, device_id: DeviceId) -> T {
        let levels = [
            ("device", self.source.device_attribute(device_id, key.name)),
            ("group", self.source.group_attribute(device_id, key.name)),
            ("server", self.source.server_attribute(key.name)),
        ];
        for (level, value) in levels {
            if let Some(raw) = value {
                match T::from_attribute(&raw) {
                    Some(parsed) => return parsed,
                    None => {
                        debug!(
                            key = key.name,
                            level,
                            expected = T::TYPE_NAME,
                            "attribute override has invalid type, falling through"
                        );
                    }
                }
            }
        }
        key.default
    }

    /// Resolve a millisecond key as a `chrono::Duration`
    pub fn lookup_duration(&self, key: &ConfigKey<i64>, device_id: DeviceId) -> chrono::Duration {
        chrono::Duration::milliseconds(self.lookup(key, device_id))
    }

    /// Validate server-level values for every key the engine queries
    ///
    /// A malformed server-level value is a deployment mistake that would
    /// otherwise silently fall back to defaults on every position, so it
    /// is surfaced here, at startup.
    pub fn validate(&self) -> Result<(), ResolverConfigError> {
        self.validate_key(&keys::IGNITION_DEBOUNCE_TIME)?;
        self.validate_key(&keys::PARKING_SPEED_THRESHOLD)?;
        self.validate_key(&keys::PARKING_TIME_THRESHOLD)?;
        self.validate_key(&keys::PARKING_MODE_ENABLED)?;
        self.validate_key(&keys::PROCESS_INVALID_POSITIONS)?;
        self.validate_key(&keys::MOTION_SPEED_THRESHOLD)?;
        Ok(())
    }

    fn validate_key<T: AttributeValue>(
        &self,
        key: &ConfigKey<T>,
    ) -> Result<(), ResolverConfigError> {
        match self.source.server_attribute(key.name) {
            Some(raw) if T::from_attribute(&raw).is_none() => {
                Err(ResolverConfigError::InvalidServerValue {
                    key: key.name,
                    expected: T::TYPE_NAME,
                })
            }
            _ => Ok(()),
        }
    }
}
