//! Motion start/stop detection

use std::sync::Arc;

use fl_attributes::{keys, AttributeResolver};
use fl_cache::DeviceCache;
use fl_core::{attr, events, Event, Position};
use tracing::debug;

use crate::filter::PositionFilter;
use crate::handler::{EventHandler, HandlerResult};
use crate::state::{HandlerStateStore, MotionState};

/// Emits moving/stopped transitions per device
///
/// The moving flag comes from the device's `motion` attribute when it
/// reports one, otherwise from the speed threshold. The first observation
/// for a device only seeds its record; transitions are reported from the
/// second observation on.
pub struct MotionHandler {
    resolver: AttributeResolver,
    filter: PositionFilter,
    states: HandlerStateStore<MotionState>,
}

impl MotionHandler {
    /// Create a handler over the cache and resolver
    pub fn new(cache: Arc<dyn DeviceCache>, resolver: AttributeResolver) -> Self {
        Self {
            resolver,
            filter: PositionFilter::new(cache),
            states: HandlerStateStore::new(),
        }
    }
}

impl EventHandler for MotionHandler {
    fn name(&self) -> &'static str {
        "motion"
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

        let speed_threshold = self
            .resolver
            .lookup(&keys::MOTION_SPEED_THRESHOLD, device_id);
        let moving = position
            .boolean(attr::KEY_MOTION)
            .unwrap_or(position.speed > speed_threshold);

        match self.states.get(device_id) {
            None => {
                self.states.set(device_id, MotionState { moving });
                Ok(Vec::new())
            }
            Some(record) if record.moving == moving => Ok(Vec::new()),
            Some(_) => {
                self.states.set(device_id, MotionState { moving });
                let event_type = if moving {
                    events::DEVICE_MOVING
                } else {
                    events::DEVICE_STOPPED
                };
                debug!(device_id = %device_id, event_type, speed = position.speed, "motion transition");
                Ok(vec![
                    Event::new(event_type, position).with_attribute("speed", position.speed)
                ])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use fl_cache::MemoryCache;
    use fl_core::{Device, DeviceId, PositionId};
    use serde_json::json;

    const DEVICE: DeviceId = DeviceId::new(1);

    fn setup() -> (Arc<MemoryCache>, MotionHandler) {
        let cache = Arc::new(MemoryCache::new());
        cache.put_device(Device::new(DEVICE, "truck-1"));
        let resolver = AttributeResolver::new(cache.clone());
        let handler = MotionHandler::new(cache.clone(), resolver);
        (cache, handler)
    }

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn feed(cache: &MemoryCache, handler: &MotionHandler, position: Position) -> Vec<Event> {
        let events = handler.on_position(&position).unwrap();
        cache.update_position(position);
        events
    }

    #[test]
    fn first_observation_only_seeds_the_record() {
        let (cache, handler) = setup();
        let position = Position::new(PositionId::new(1), DEVICE, t(0))
            .with_attribute(attr::KEY_MOTION, true);
        assert!(feed(&cache, &handler, position).is_empty());
    }

    #[test]
    fn transitions_emit_moving_then_stopped() {
        let (cache, handler) = setup();
        let stopped = |id, secs| {
            Position::new(PositionId::new(id), DEVICE, t(secs))
                .with_attribute(attr::KEY_MOTION, false)
        };
        let moving = |id, secs| {
            Position::new(PositionId::new(id), DEVICE, t(secs))
                .with_speed(35.0)
                .with_attribute(attr::KEY_MOTION, true)
        };

        feed(&cache, &handler, stopped(1, 0));
        let events = feed(&cache, &handler, moving(2, 10));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), events::DEVICE_MOVING);
        assert_eq!(events[0].attribute::<f64>("speed"), Some(35.0));

        // Repeats of the same state stay silent
        assert!(feed(&cache, &handler, moving(3, 20)).is_empty());

        let events = feed(&cache, &handler, stopped(4, 30));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), events::DEVICE_STOPPED);
    }

    #[test]
    fn speed_threshold_substitutes_for_a_missing_motion_attribute() {
        let cache = Arc::new(MemoryCache::new());
        cache.put_device(
            Device::new(DEVICE, "truck-1")
                .with_attribute(keys::MOTION_SPEED_THRESHOLD.name(), json!(3.0)),
        );
        let resolver = AttributeResolver::new(cache.clone());
        let handler = MotionHandler::new(cache.clone(), resolver);

        feed(
            &cache,
            &handler,
            Position::new(PositionId::new(1), DEVICE, t(0)).with_speed(0.0),
        );
        // 3.0 is not strictly above the threshold
        assert!(feed(
            &cache,
            &handler,
            Position::new(PositionId::new(2), DEVICE, t(10)).with_speed(3.0),
        )
        .is_empty());

        let events = feed(
            &cache,
            &handler,
            Position::new(PositionId::new(3), DEVICE, t(20)).with_speed(12.0),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), events::DEVICE_MOVING);
    }

    #[test]
    fn devices_do_not_share_motion_state() {
        let cache = Arc::new(MemoryCache::new());
        cache.put_device(Device::new(DeviceId::new(1), "truck-1"));
        cache.put_device(Device::new(DeviceId::new(2), "truck-2"));
        let resolver = AttributeResolver::new(cache.clone());
        let handler = MotionHandler::new(cache.clone(), resolver);

        let position = |id, device, moving| {
            Position::new(PositionId::new(id), DeviceId::new(device), t(id as i64))
                .with_attribute(attr::KEY_MOTION, moving)
        };

        feed(&cache, &handler, position(1, 1, false));
        feed(&cache, &handler, position(2, 2, true));

        // Device 1 starts moving; device 2's record is untouched
        assert_eq!(feed(&cache, &handler, position(3, 1, true)).len(), 1);
        assert!(feed(&cache, &handler, position(4, 2, true)).is_empty());
    }
}
