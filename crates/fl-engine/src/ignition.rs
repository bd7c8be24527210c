//! Ignition transition detection with per-device debouncing

use std::sync::Arc;

use fl_attributes::{keys, AttributeResolver};
use fl_cache::DeviceCache;
use fl_core::{attr, events, Event, Position};
use tracing::debug;

use crate::filter::PositionFilter;
use crate::handler::{EventHandler, HandlerResult};
use crate::state::{HandlerStateStore, IgnitionState};

/// Detects ignition on/off transitions, debounced per device
///
/// A transition is detected by comparing the `ignition` attribute of the
/// current position against the device's cached previous position. Noisy
/// devices that toggle rapidly are debounced: a change back to the state
/// of the last emitted event within the debounce window is suppressed as
/// chatter. All timing uses position fix times, never processing time, so
/// replayed or backfilled data debounces consistently.
pub struct IgnitionHandler {
    cache: Arc<dyn DeviceCache>,
    resolver: AttributeResolver,
    filter: PositionFilter,
    states: HandlerStateStore<IgnitionState>,
}

impl IgnitionHandler {
    /// Create a handler over the cache and resolver
    pub fn new(cache: Arc<dyn DeviceCache>, resolver: AttributeResolver) -> Self {
        let filter = PositionFilter::new(cache.clone());
        Self {
            cache,
            resolver,
            filter,
            states: HandlerStateStore::new(),
        }
    }
}

impl EventHandler for IgnitionHandler {
    fn name(&self) -> &'static str {
        "ignition"
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

        // Both sides of the comparison must actually report ignition
        let Some(ignition) = position.boolean(attr::KEY_IGNITION) else {
            return Ok(Vec::new());
        };
        let Some(last_position) = self.cache.last_position(device_id) else {
            return Ok(Vec::new());
        };
        let Some(previous) = last_position.boolean(attr::KEY_IGNITION) else {
            return Ok(Vec::new());
        };

        if ignition == previous {
            // Nothing toggled; slide the debounce window forward while the
            // position stream keeps confirming the last emitted state
            self.states.modify(device_id, |record| {
                if record.last_event_state == ignition {
                    record.last_event_time = position.fix_time;
                }
            });
            return Ok(Vec::new());
        }

        let debounce = self
            .resolver
            .lookup_duration(&keys::IGNITION_DEBOUNCE_TIME, device_id);
        let emit = match self.states.get(device_id) {
            Some(record) => {
                position.fix_time - record.last_event_time >= debounce
                    || ignition != record.last_event_state
            }
            None => true,
        };
        if !emit {
            debug!(
                device_id = %device_id,
                ignition,
                "ignition toggle suppressed within debounce window"
            );
            return Ok(Vec::new());
        }

        self.states.set(
            device_id,
            IgnitionState {
                last_event_time: position.fix_time,
                last_event_state: ignition,
            },
        );
        let event_type = if ignition {
            events::IGNITION_ON
        } else {
            events::IGNITION_OFF
        };
        debug!(device_id = %device_id, event_type, "ignition transition");
        Ok(vec![Event::new(event_type, position)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use fl_cache::MemoryCache;
    use fl_core::{Device, DeviceId, PositionId};
    use serde_json::json;

    const DEVICE: DeviceId = DeviceId::new(1);
    const DEBOUNCE_MS: i64 = 30_000;

    fn setup() -> (Arc<MemoryCache>, IgnitionHandler) {
        let cache = Arc::new(MemoryCache::new());
        cache.put_device(Device::new(DEVICE, "truck-1"));
        let resolver = AttributeResolver::new(cache.clone());
        let handler = IgnitionHandler::new(cache.clone(), resolver);
        (cache, handler)
    }

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn ignition_position(id: u64, fix_time: DateTime<Utc>, ignition: bool) -> Position {
        Position::new(PositionId::new(id), DEVICE, fix_time)
            .with_attribute(attr::KEY_IGNITION, ignition)
    }

    /// Run one position through the handler and advance the cache, the
    /// way the dispatcher does.
    fn feed(cache: &MemoryCache, handler: &IgnitionHandler, position: Position) -> Vec<Event> {
        let events = handler.on_position(&position).unwrap();
        cache.update_position(position);
        events
    }

    #[test]
    fn first_position_never_emits() {
        let (cache, handler) = setup();
        let events = feed(&cache, &handler, ignition_position(1, t(0), true));
        assert!(events.is_empty());
    }

    #[test]
    fn transition_emits_on_and_off() {
        let (cache, handler) = setup();
        feed(&cache, &handler, ignition_position(1, t(0), false));

        let events = feed(&cache, &handler, ignition_position(2, t(60), true));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), events::IGNITION_ON);

        let events = feed(&cache, &handler, ignition_position(3, t(120), false));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), events::IGNITION_OFF);
    }

    #[test]
    fn opposite_transition_within_window_still_emits() {
        let (cache, handler) = setup();
        feed(&cache, &handler, ignition_position(1, t(0), false));
        assert_eq!(feed(&cache, &handler, ignition_position(2, t(10), true)).len(), 1);

        // A transition landing on a different state than the last emitted
        // event is never debounced, however close it follows
        let events = feed(&cache, &handler, ignition_position(3, t(15), false));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), events::IGNITION_OFF);
    }

    #[test]
    fn repeat_transition_to_last_emitted_state_is_suppressed() {
        let (cache, handler) = setup();
        feed(&cache, &handler, ignition_position(1, t(0), false));
        assert_eq!(feed(&cache, &handler, ignition_position(2, t(10), true)).len(), 1);

        // A glitchy off fix without a valid flag: the handler skips it but
        // the dispatcher still advances the cache
        let glitch = ignition_position(3, t(12), false).with_valid(false);
        assert!(feed(&cache, &handler, glitch).is_empty());

        // Back to on 2s later: same state as last emitted, within the
        // window, so this is chatter
        assert!(feed(&cache, &handler, ignition_position(4, t(14), true)).is_empty());
    }

    #[test]
    fn repeat_transition_after_window_emits() {
        let (cache, handler) = setup();
        feed(&cache, &handler, ignition_position(1, t(0), false));
        feed(&cache, &handler, ignition_position(2, t(10), true));
        let glitch = ignition_position(3, t(12), false).with_valid(false);
        feed(&cache, &handler, glitch);

        let after = t(10) + Duration::milliseconds(DEBOUNCE_MS);
        let events = feed(&cache, &handler, ignition_position(4, after, true));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), events::IGNITION_ON);
    }

    #[test]
    fn unchanged_state_slides_the_window_forward() {
        let (cache, handler) = setup();
        feed(&cache, &handler, ignition_position(1, t(0), false));
        feed(&cache, &handler, ignition_position(2, t(10), true));

        // A confirmation of the last emitted state re-arms the window
        feed(&cache, &handler, ignition_position(3, t(25), true));

        let glitch = ignition_position(4, t(30), false).with_valid(false);
        feed(&cache, &handler, glitch);

        // 35s after the original emission but only 20s after the last
        // confirmation: still suppressed, proving the slide happened
        assert!(feed(&cache, &handler, ignition_position(5, t(45), true)).is_empty());

        // Past the window counted from the confirmation: emits again
        let glitch = ignition_position(6, t(50), false).with_valid(false);
        feed(&cache, &handler, glitch);
        let events = feed(&cache, &handler, ignition_position(7, t(56), true));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn missing_ignition_attribute_is_a_no_op() {
        let (cache, handler) = setup();
        feed(&cache, &handler, ignition_position(1, t(0), false));

        let bare = Position::new(PositionId::new(2), DEVICE, t(10));
        assert!(feed(&cache, &handler, bare).is_empty());

        // Previous position has no ignition either: still a no-op
        let next = ignition_position(3, t(20), true);
        assert!(feed(&cache, &handler, next).is_empty());
    }

    #[test]
    fn invalid_positions_are_skipped_unless_configured() {
        let (cache, handler) = setup();
        feed(&cache, &handler, ignition_position(1, t(0), false));

        let invalid = ignition_position(2, t(60), true).with_valid(false);
        assert!(handler.on_position(&invalid).unwrap().is_empty());
    }

    #[test]
    fn invalid_positions_are_processed_when_enabled() {
        let cache = Arc::new(MemoryCache::new());
        cache.put_device(
            Device::new(DEVICE, "truck-1")
                .with_attribute(keys::PROCESS_INVALID_POSITIONS.name(), json!(true)),
        );
        let resolver = AttributeResolver::new(cache.clone());
        let handler = IgnitionHandler::new(cache.clone(), resolver);

        feed(&cache, &handler, ignition_position(1, t(0), false));
        let invalid = ignition_position(2, t(60), true).with_valid(false);
        assert_eq!(feed(&cache, &handler, invalid).len(), 1);
    }

    #[test]
    fn stale_position_does_not_touch_state() {
        let (cache, handler) = setup();
        feed(&cache, &handler, ignition_position(1, t(0), false));
        feed(&cache, &handler, ignition_position(2, t(60), true));

        // An out-of-order replay of the off state is rejected outright
        let stale = ignition_position(1, t(0), false);
        assert!(handler.on_position(&stale).unwrap().is_empty());

        // The next genuine transition still compares against the on state
        let events = feed(&cache, &handler, ignition_position(3, t(120), false));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), events::IGNITION_OFF);
    }
}
