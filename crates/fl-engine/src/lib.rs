//! Event-detection rule engine for FleetLink
//!
//! The engine consumes a per-device stream of accepted positions and emits
//! semantic events: ignition transitions, parking-mode violations, motion
//! alerts. Each rule lives in an independent [`EventHandler`]; the
//! [`Dispatcher`] feeds every accepted position to each handler in a fixed
//! order, collects the emitted events, and forwards them to an
//! [`EventSink`].
//!
//! Handlers keep their per-device memory in an explicit
//! [`HandlerStateStore`] rather than ambient shared fields, so ownership
//! and locking are visible and each handler is testable in isolation.
//! All state is ephemeral; nothing survives a process restart.

mod dispatcher;
mod filter;
mod handler;
mod ignition;
mod motion;
mod parking;
mod sink;
mod state;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use filter::PositionFilter;
pub use handler::{EventHandler, HandlerError, HandlerResult};
pub use ignition::IgnitionHandler;
pub use motion::MotionHandler;
pub use parking::ParkingModeHandler;
pub use sink::{BusSink, CollectingSink, EventSink, NullSink};
pub use state::{HandlerStateStore, IgnitionState, MotionState};
