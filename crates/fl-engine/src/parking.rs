//! Parking-mode violation detection

use std::sync::Arc;

use fl_attributes::{keys, AttributeResolver};
use fl_cache::DeviceCache;
use fl_core::{attr, events, Event, Position};
use tracing::debug;

use crate::filter::PositionFilter;
use crate::handler::{EventHandler, HandlerResult};

/// Detects unauthorized activity while a device is in parking mode
///
/// The parked predicate is derived per evaluation from the current and
/// previous position, never stored: a device is parked when it reports no
/// motion and its speed sits at or below the speed threshold. Three
/// independent checks run against that predicate (sudden movement,
/// ignition turning on, door activity); each emits its own alert with the
/// diagnostics needed to reconstruct why it fired. A parking alarm tag on
/// the position itself short-circuits everything: it is the device's own
/// authoritative signal and bypasses the hysteresis entirely.
pub struct ParkingModeHandler {
    cache: Arc<dyn DeviceCache>,
    resolver: AttributeResolver,
    filter: PositionFilter,
}

impl ParkingModeHandler {
    /// Create a handler over the cache and resolver
    pub fn new(cache: Arc<dyn DeviceCache>, resolver: AttributeResolver) -> Self {
        let filter = PositionFilter::new(cache.clone());
        Self {
            cache,
            resolver,
            filter,
        }
    }
}

fn is_parked(position: &Position, speed_threshold: f64) -> bool {
    !position.boolean(attr::KEY_MOTION).unwrap_or(false) && position.speed <= speed_threshold
}

impl EventHandler for ParkingModeHandler {
    fn name(&self) -> &'static str {
        "parking-mode"
    }

    fn on_position(&self, position: &Position) -> HandlerResult<Vec<Event>> {
        if !self.filter.accept(position) {
            return Ok(Vec::new());
        }
        let device_id = position.device_id;
        if !position.valid
            && !self
                .resolver
                .lookup(&keys::PROCESS_INVALID_POSITIONS, device_id)
        {
            return Ok(Vec::new());
        }

        // Device-signalled parking alarm: first match wins, nothing else
        // is consulted
        if position
            .string(attr::KEY_ALARM)
            .is_some_and(|alarm| alarm.contains(attr::ALARM_PARKING))
        {
            debug!(device_id = %device_id, "parking alarm reported by device");
            return Ok(vec![Event::new(events::PARKING_MODE_ALERT, position)
                .with_attribute(attr::KEY_ALARM, attr::ALARM_PARKING)
                .with_attribute("message", "Parking mode alert detected")]);
        }

        if !self.resolver.lookup(&keys::PARKING_MODE_ENABLED, device_id) {
            return Ok(Vec::new());
        }
        let Some(last_position) = self.cache.last_position(device_id) else {
            return Ok(Vec::new());
        };

        let speed_threshold = self
            .resolver
            .lookup(&keys::PARKING_SPEED_THRESHOLD, device_id);
        let time_threshold = self
            .resolver
            .lookup_duration(&keys::PARKING_TIME_THRESHOLD, device_id);

        let currently_parked = is_parked(position, speed_threshold);
        let was_parked = is_parked(&last_position, speed_threshold);

        let mut detected = Vec::new();

        // Sudden movement after being parked: a sharp speed increase
        // within a short window, not a gradual drift
        if was_parked && !currently_parked {
            let speed_difference = position.speed - last_position.speed;
            let time_difference = position.fix_time - last_position.fix_time;
            if speed_difference > speed_threshold && time_difference < time_threshold {
                debug!(
                    device_id = %device_id,
                    speed_difference,
                    time_difference_ms = time_difference.num_milliseconds(),
                    "unauthorized movement while parked"
                );
                detected.push(
                    Event::new(events::PARKING_MODE_ALERT, position)
                        .with_attribute("previousSpeed", last_position.speed)
                        .with_attribute("currentSpeed", position.speed)
                        .with_attribute("speedDifference", speed_difference)
                        .with_attribute("timeDifference", time_difference.num_milliseconds())
                        .with_attribute(
                            "message",
                            "Unauthorized movement detected while in parking mode",
                        ),
                );
            }
        }

        // Ignition turning on while parked
        if let (Some(current_ignition), Some(previous_ignition)) = (
            position.boolean(attr::KEY_IGNITION),
            last_position.boolean(attr::KEY_IGNITION),
        ) {
            if !previous_ignition && current_ignition && was_parked {
                detected.push(
                    Event::new(events::PARKING_MODE_ALERT, position)
                        .with_attribute("ignitionChange", true)
                        .with_attribute("previousIgnition", previous_ignition)
                        .with_attribute("currentIgnition", current_ignition)
                        .with_attribute("message", "Ignition activated while in parking mode"),
                );
            }
        }

        // Door activity while parked; door values are device dependent
        // (boolean or bitmask) so any change counts
        if let (Some(current_door), Some(previous_door)) = (
            position.attributes.get(attr::KEY_DOOR),
            last_position.attributes.get(attr::KEY_DOOR),
        ) {
            if current_door != previous_door && was_parked {
                detected.push(
                    Event::new(events::PARKING_MODE_ALERT, position)
                        .with_attribute("doorChange", true)
                        .with_attribute("previousDoor", previous_door.clone())
                        .with_attribute("currentDoor", current_door.clone())
                        .with_attribute("message", "Door activity detected while in parking mode"),
                );
            }
        }

        Ok(detected)
    }
}
