//! Trip-level realtime aggregates.

use chrono::NaiveDate;

use super::{SourceId, StopTimeUpdate, TripId};

/// Realtime status of a whole trip occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripStatus {
    Scheduled,
    Update,
    Add,
    Delete,
}

/// Rider-facing severity/category of a disruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    NoService,
    ReducedService,
    SignificantDelays,
    Detour,
    AdditionalService,
    ModifiedService,
    OtherEffect,
    UnknownEffect,
    StopMoved,
}

/// Identity of one trip occurrence: a scheduled trip on a circulation date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripKey {
    pub trip_id: TripId,
    pub date: NaiveDate,
}

/// Aggregate of current realtime knowledge for one trip occurrence.
///
/// Created on the first observed disruption for the occurrence and mutated
/// in place by every subsequent feed for the same trip and date. When the
/// status becomes [`TripStatus::Delete`] the stop-time list is emptied but
/// the aggregate itself survives.
///
/// `company`, `physical_mode` and `headsign` are only meaningful when the
/// status is [`TripStatus::Add`] (a trip absent from the base schedule).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripUpdate {
    pub trip_id: TripId,
    pub date: NaiveDate,
    pub status: TripStatus,
    pub effect: Option<Effect>,
    pub stop_time_updates: Vec<StopTimeUpdate>,
    pub message: Option<String>,
    pub contributor: SourceId,
    pub company: Option<String>,
    pub physical_mode: Option<String>,
    pub headsign: Option<String>,
}

impl TripUpdate {
    /// A fresh aggregate with no stop-time records.
    pub fn new(trip_id: TripId, date: NaiveDate, contributor: SourceId) -> Self {
        Self {
            trip_id,
            date,
            status: TripStatus::Scheduled,
            effect: None,
            stop_time_updates: Vec::new(),
            message: None,
            contributor,
            company: None,
            physical_mode: None,
            headsign: None,
        }
    }

    /// The owning (trip identity, start date) row key.
    pub fn key(&self) -> TripKey {
        TripKey {
            trip_id: self.trip_id.clone(),
            date: self.date,
        }
    }

    /// Whether the message is absent or blank.
    ///
    /// Differential formats may not clear a message with an empty value;
    /// the merge uses this to decide whether to keep the stored message.
    pub fn message_is_empty(&self) -> bool {
        self.message.as_deref().is_none_or(|m| m.trim().is_empty())
    }

    /// Invariant check: orders are exactly `0..N` in list position.
    pub fn orders_are_contiguous(&self) -> bool {
        self.stop_time_updates
            .iter()
            .enumerate()
            .all(|(i, stu)| stu.order as usize == i)
    }
}
