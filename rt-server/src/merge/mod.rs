//! The reconciliation engine.
//!
//! Merges three independent, possibly-inconsistent views of a trip (the
//! immutable base schedule, the previously stored realtime state, and a
//! newly received update) into one consistent trip state, enforcing
//! timeline invariants and deciding whether anything actually changed.
//!
//! Layering, leaves first:
//! - [`evaluator`]: per stop-event, is it served and is a proposed change valid;
//! - [`stop_merge`]: one merged record per stop, chaining the running
//!   time/delay state across stops;
//! - [`enforce`]: full-trip post-pass guaranteeing end-to-end monotonicity;
//! - [`trip_merge`]: drives the per-stop walk and decides no-op vs change.

pub mod enforce;
pub mod evaluator;
pub mod stop_merge;
pub mod trip_merge;

pub use enforce::{TripInconsistent, enforce};
pub use evaluator::{is_served, is_valid_change};
pub use stop_merge::{RunningState, StopMergeOutcome, merge_stop};
pub use trip_merge::{MergeError, MergedTrip, merge};
