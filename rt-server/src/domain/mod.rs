//! Domain types for realtime trip reconciliation.
//!
//! This module contains the core domain model: the immutable base-schedule
//! snapshot (`VehicleJourney`), the mutable realtime knowledge for one trip
//! occurrence (`TripUpdate` and its `StopTimeUpdate`s), and the append-only
//! audit record for one ingested payload (`RealTimeUpdate`). Types enforce
//! their invariants at construction time where they can, so code receiving
//! them can trust their validity.

mod audit;
mod ids;
mod stop_time;
mod time;
mod trip_update;
mod vehicle_journey;

pub use audit::{FeedStatus, RealTimeUpdate};
pub use ids::{InvalidId, SourceId, StopId, TripId};
pub use stop_time::{EventKind, EventStatus, StopTimeUpdate};
pub use time::{DateWindow, TimeError, TimelineCursor};
pub use trip_update::{Effect, TripKey, TripStatus, TripUpdate};
pub use vehicle_journey::{ScheduledCall, ScheduledStopTime, VehicleJourney};
