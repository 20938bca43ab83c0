//! Whole-trip merge orchestration.
//!
//! Drives the per-stop walk across a trip and decides whether the feed
//! actually changed anything. Returns a new merged value plus a flag saying
//! whether it replaces an existing row or is a first recording; `None`
//! means a no-op and callers must not persist or publish.
//!
//! Known limitation: the base schedule itself changing between two feeds
//! for the same trip occurrence is not detected or reconciled. The stored
//! record's stop sequence is trusted to still correspond to the freshly
//! fetched `VehicleJourney`.

use tracing::warn;

use crate::domain::{
    Effect, TimeError, TripId, TripStatus, TripUpdate, VehicleJourney,
};

use super::enforce::{TripInconsistent, enforce};
use super::stop_merge::{RunningState, merge_stop};

/// A merged trip ready for persistence.
#[derive(Debug, Clone)]
pub struct MergedTrip {
    pub trip: TripUpdate,
    /// True when the merge updates an existing row, false when it inserts
    /// the first realtime record for this trip occurrence.
    pub replaces_existing: bool,
}

/// A trip that could not be merged. The trip alone is skipped; sibling
/// trips in the same feed are unaffected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MergeError {
    #[error("trip {trip} rejected: {source}")]
    Inconsistent {
        trip: TripId,
        #[source]
        source: TripInconsistent,
    },

    #[error("trip {trip}: stop orders not contiguous at index {index}")]
    OrderViolation { trip: TripId, index: usize },

    #[error("trip {trip}: {source}")]
    Timeline {
        trip: TripId,
        #[source]
        source: TimeError,
    },
}

/// Merge a proposed update into the stored state for one trip occurrence.
///
/// - Trip-level status and effect always take the proposed value; the
///   message does too, except that a differential format cannot clear a
///   message with an empty value.
/// - A resulting `Delete` status drops all stop-times immediately.
/// - Otherwise the stop walk is anchored on the proposed list for complete
///   formats (which always send the full trip) and for added trips (which
///   have no base schedule), and on the base schedule for differential
///   formats (which only ever describe a subset).
///
/// Returns `Ok(None)` when nothing changed.
pub fn merge(
    vj: &VehicleJourney,
    stored: Option<&TripUpdate>,
    proposed: &TripUpdate,
    is_new_complete: bool,
) -> Result<Option<MergedTrip>, MergeError> {
    let mut trip = match stored {
        Some(s) => s.clone(),
        None => TripUpdate::new(
            proposed.trip_id.clone(),
            proposed.date,
            proposed.contributor.clone(),
        ),
    };
    let mut changed = stored.is_none();

    if trip.status != proposed.status {
        trip.status = proposed.status;
        changed = true;
    }
    if trip.effect != proposed.effect {
        trip.effect = proposed.effect;
        changed = true;
    }
    // Only complete formats may clear a message with an explicit empty
    // value; a differential format's empty message means "no information".
    if is_new_complete || !proposed.message_is_empty() {
        if trip.message != proposed.message {
            trip.message = proposed.message.clone();
            changed = true;
        }
    }
    if proposed.status == TripStatus::Add {
        if trip.company != proposed.company
            || trip.physical_mode != proposed.physical_mode
            || trip.headsign != proposed.headsign
        {
            trip.company = proposed.company.clone();
            trip.physical_mode = proposed.physical_mode.clone();
            trip.headsign = proposed.headsign.clone();
            changed = true;
        }
    }

    // A cancelled trip keeps its row but no stop detail; no further
    // per-stop work is meaningful.
    if trip.status == TripStatus::Delete {
        if !trip.stop_time_updates.is_empty() {
            trip.stop_time_updates.clear();
            changed = true;
        }
        if trip.effect != Some(Effect::NoService) {
            trip.effect = Some(Effect::NoService);
            changed = true;
        }
        if !changed {
            return Ok(None);
        }
        return Ok(Some(MergedTrip {
            trip,
            replaces_existing: stored.is_some(),
        }));
    }

    let base_stops = vj.stop_datetimes().map_err(|source| MergeError::Timeline {
        trip: vj.trip_id.clone(),
        source,
    })?;
    let old_stops = std::mem::take(&mut trip.stop_time_updates);

    let mut new_stops = Vec::new();
    let mut state = RunningState::default();

    // Complete formats always send the full trip; an added trip has no base
    // schedule to anchor on, so its feed defines the stop list either way.
    if is_new_complete || proposed.status == TripStatus::Add {
        let mut base_cursor = 0;
        let mut stored_cursor = 0;
        for (i, p) in proposed.stop_time_updates.iter().enumerate() {
            let base = find_forward(&base_stops, &mut base_cursor, |b| b.stop_id == p.stop_id);
            let old = find_forward(&old_stops, &mut stored_cursor, |s| s.stop_id == p.stop_id);
            let out = merge_stop(&p.stop_id, base, old, Some(p), i as u32, &mut state, is_new_complete);
            changed |= out.changed;
            new_stops.push(out.record);
        }
    } else {
        // Differential formats only describe a subset: anchor the walk on
        // the base schedule.
        let mut proposed_cursor = 0;
        let mut stored_cursor = 0;
        for (i, call) in base_stops.iter().enumerate() {
            let p = find_forward(&proposed.stop_time_updates, &mut proposed_cursor, |s| {
                s.stop_id == call.stop_id
            });
            let old = find_forward(&old_stops, &mut stored_cursor, |s| s.stop_id == call.stop_id);
            let out = merge_stop(&call.stop_id, Some(call), old, p, i as u32, &mut state, false);
            changed |= out.changed;
            new_stops.push(out.record);
        }
        if proposed_cursor < proposed.stop_time_updates.len() {
            warn!(
                trip = %proposed.trip_id,
                unmatched = proposed.stop_time_updates.len() - proposed_cursor,
                "differential feed references stops missing from the base schedule"
            );
        }
    }

    // Stops dropped by a shorter complete feed are a change too.
    if !old_stops.is_empty() && old_stops.len() != new_stops.len() {
        changed = true;
    }

    let repaired = enforce(&mut new_stops).map_err(|source| MergeError::Inconsistent {
        trip: vj.trip_id.clone(),
        source,
    })?;
    changed |= repaired;

    for (index, stop) in new_stops.iter().enumerate() {
        if stop.order as usize != index {
            return Err(MergeError::OrderViolation {
                trip: vj.trip_id.clone(),
                index,
            });
        }
    }

    if !changed {
        return Ok(None);
    }

    trip.stop_time_updates = new_stops;
    Ok(Some(MergedTrip {
        trip,
        replaces_existing: stored.is_some(),
    }))
}

/// Find the first element at or after `*cursor` matching the predicate,
/// advancing the cursor past it. The cursor is left untouched on a miss, so
/// later stops can still match.
fn find_forward<'a, T>(
    items: &'a [T],
    cursor: &mut usize,
    pred: impl Fn(&T) -> bool,
) -> Option<&'a T> {
    let found = items[*cursor..].iter().position(|item| pred(item))?;
    let index = *cursor + found;
    *cursor = index + 1;
    Some(&items[index])
}
