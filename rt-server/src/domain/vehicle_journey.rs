//! Immutable base-schedule snapshot of one trip occurrence.

use chrono::{NaiveDate, NaiveTime};

use super::time::{DateWindow, TimeError, TimelineCursor};
use super::{StopId, TripId};

/// One scheduled stop, as published by the base schedule: a stop identity
/// and UTC times-of-day for arrival and departure. Either event may be
/// unpublished (origin stops have no arrival, terminus stops no departure,
/// and some stops are pass-through for one direction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCall {
    pub stop_id: StopId,
    pub arrival: Option<NaiveTime>,
    pub departure: Option<NaiveTime>,
}

/// A scheduled stop resolved to absolute datetimes by the pass-midnight walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledStopTime {
    pub stop_id: StopId,
    pub arrival: Option<chrono::NaiveDateTime>,
    pub departure: Option<chrono::NaiveDateTime>,
}

/// Read-only snapshot of one base-schedule trip occurrence.
///
/// Fetched fresh from the schedule provider for every merge; never mutated.
/// `window` records the date range the snapshot was fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleJourney {
    pub trip_id: TripId,
    pub circulation_date: NaiveDate,
    pub calls: Vec<ScheduledCall>,
    pub window: DateWindow,
}

impl VehicleJourney {
    pub fn new(
        trip_id: TripId,
        circulation_date: NaiveDate,
        calls: Vec<ScheduledCall>,
        window: DateWindow,
    ) -> Self {
        Self {
            trip_id,
            circulation_date,
            calls,
            window,
        }
    }

    /// Resolve the scheduled times-of-day to absolute datetimes.
    ///
    /// Walks arrival then departure for each call in order; a decrease in
    /// time-of-day advances the circulation date by one day (pass-midnight).
    /// This walk is independent of the realtime walk over the same trip.
    pub fn stop_datetimes(&self) -> Result<Vec<ScheduledStopTime>, TimeError> {
        let mut cursor = TimelineCursor::new(self.circulation_date);
        let mut result = Vec::with_capacity(self.calls.len());
        for call in &self.calls {
            let arrival = cursor.next_opt(call.arrival)?;
            let departure = cursor.next_opt(call.departure)?;
            result.push(ScheduledStopTime {
                stop_id: call.stop_id.clone(),
                arrival,
                departure,
            });
        }
        Ok(result)
    }
}
