//! Shared staleness precondition for all handlers

use std::sync::Arc;

use fl_cache::DeviceCache;
use fl_core::Position;
use tracing::trace;

/// Accept/reject gate applied before any rule evaluation
///
/// A position is rejected when its device is unknown or when it is not
/// the newest for its device. Rejected positions mutate no state and
/// emit no events, which makes dispatch idempotent under retransmission
/// and out-of-order delivery.
#[derive(Clone)]
pub struct PositionFilter {
    cache: Arc<dyn DeviceCache>,
}

impl PositionFilter {
    /// Create a filter over the device cache
    pub fn new(cache: Arc<dyn DeviceCache>) -> Self {
        Self { cache }
    }

    /// Check whether a position may be evaluated
    pub fn accept(&self, position: &Position) -> bool {
        if self.cache.device(position.device_id).is_none() {
            trace!(device_id = %position.device_id, "unknown device, position rejected");
            return false;
        }
        if !self.cache.is_latest(position) {
            trace!(
                device_id = %position.device_id,
                position_id = %position.id,
                "stale position rejected"
            );
            return false;
        }
        true
    }
}
