//! Per-stop merge step.
//!
//! Produces one merged [`StopTimeUpdate`] from up to three views of a stop:
//! the base-schedule stop time, the previously stored record and the newly
//! proposed record. The running state (the previous stop's resulting
//! departure time and delay) is chained through the walk, which is what
//! lets a delay propagate to later stops that carry no explicit data and
//! keeps the whole trip on one monotonic timeline even when the upstream
//! feed is locally inconsistent or partial.

use chrono::{Duration, NaiveDateTime};
use tracing::warn;

use crate::domain::{EventKind, EventStatus, ScheduledStopTime, StopId, StopTimeUpdate};

use super::evaluator::is_valid_change;

/// State chained from one stop to the next: the previous stop's resulting
/// departure time and the delay currently running along the trip.
#[derive(Debug, Clone, Default)]
pub struct RunningState {
    pub departure: Option<NaiveDateTime>,
    pub delay: Duration,
}

/// Result of merging one stop.
#[derive(Debug, Clone)]
pub struct StopMergeOutcome {
    pub record: StopTimeUpdate,
    pub changed: bool,
}

/// Merge one stop from base schedule + stored state + proposed update.
///
/// The caller supplies the stop identity, since it drives the walk and
/// always knows which stop it is matching.
///
/// The four-way decision by (stored exists?, proposed exists?):
/// - both: recompute, changed only if the result differs from stored;
/// - only proposed: first recording, always changed;
/// - only stored: keep as is, only the order is refreshed, not changed;
/// - neither: synthesize from the base schedule, changed (first time
///   anything is recorded for this stop).
///
/// `is_new_complete` is true for formats that always send the full trip:
/// for those, an event absent from the proposed record means "back to
/// schedule" rather than "no information" and stored knowledge for it is
/// not carried over.
pub fn merge_stop(
    stop_id: &StopId,
    base: Option<&ScheduledStopTime>,
    stored: Option<&StopTimeUpdate>,
    proposed: Option<&StopTimeUpdate>,
    order: u32,
    state: &mut RunningState,
    is_new_complete: bool,
) -> StopMergeOutcome {
    if proposed.is_none() {
        if let Some(stored) = stored {
            // Only stored: keep the record, refresh the order.
            let mut record = stored.clone();
            record.order = order;
            advance_state(state, &record);
            return StopMergeOutcome {
                record,
                changed: false,
            };
        }
    }

    let mut record = StopTimeUpdate::new(stop_id.clone(), order);

    for kind in [EventKind::Arrival, EventKind::Departure] {
        let (time, delay, status) = resolve_event(kind, base, stored, proposed, state, is_new_complete);
        record.set_event(kind, time, delay, status);
        if !status.is_deleted() {
            if let Some(d) = delay {
                state.delay = d;
            }
        }
    }

    record.message = proposed
        .and_then(|p| p.message.clone())
        .or_else(|| match (is_new_complete, stored) {
            (false, Some(s)) => s.message.clone(),
            _ => None,
        });

    push_forward(&mut record, state);

    let changed = match stored {
        Some(stored) => !record.same_content(stored),
        None => true,
    };

    advance_state(state, &record);
    StopMergeOutcome { record, changed }
}

/// Resolve one event's (time, delay, status).
fn resolve_event(
    kind: EventKind,
    base: Option<&ScheduledStopTime>,
    stored: Option<&StopTimeUpdate>,
    proposed: Option<&StopTimeUpdate>,
    state: &RunningState,
    is_new_complete: bool,
) -> (Option<NaiveDateTime>, Option<Duration>, EventStatus) {
    let base_time = base.and_then(|b| match kind {
        EventKind::Arrival => b.arrival,
        EventKind::Departure => b.departure,
    });
    let stored_status = stored.map(|s| s.event_status(kind));

    if let Some(p) = proposed {
        let status = p.event_status(kind);
        if status != EventStatus::Scheduled {
            if !is_valid_change(Some(status), stored_status, base_time.is_some()) {
                warn!(
                    stop = %p.stop_id,
                    ?kind,
                    ?status,
                    "invalid stop-event change, ignoring the event"
                );
            } else {
                return match status {
                    EventStatus::Update => {
                        let delay = p.event_delay(kind).unwrap_or_else(Duration::zero);
                        let time = base_time
                            .map(|t| t + delay)
                            .or_else(|| p.event_time(kind));
                        (time, Some(delay), status)
                    }
                    EventStatus::Delete | EventStatus::DeletedForDetour => {
                        // Time unset; the stop identity alone marks what
                        // was removed.
                        (None, None, status)
                    }
                    EventStatus::Add | EventStatus::AddedForDetour => {
                        // Delay is pre-applied in the proposed time.
                        let delay = p.event_delay(kind).unwrap_or_else(Duration::zero);
                        (p.event_time(kind), Some(delay), status)
                    }
                    EventStatus::Scheduled => unreachable!(),
                };
            }
        }
    }

    // No usable proposed data for this event. Differential formats only
    // describe what changed, so stored knowledge survives; complete formats
    // resend everything, so absence means back-to-schedule.
    if !is_new_complete {
        if let Some(s) = stored {
            if s.has_event(kind) {
                return (s.event_time(kind), s.event_delay(kind), s.event_status(kind));
            }
        }
    }

    match base_time {
        // The running delay chains onto stops with no explicit data.
        Some(t) => (Some(t + state.delay), Some(state.delay), EventStatus::Scheduled),
        None => (None, None, EventStatus::Scheduled),
    }
}

/// Local consistency: the current stop's events may not precede the
/// previous stop's resulting departure, and departure may not precede
/// arrival. Events pushed forward carry the shift into their delay so the
/// reported delay stays consistent with the absolute time.
fn push_forward(record: &mut StopTimeUpdate, state: &RunningState) {
    if let Some(prev_dep) = state.departure {
        shift_event_to(record, EventKind::Arrival, prev_dep);
        shift_event_to(record, EventKind::Departure, prev_dep);
    }
    if !record.arrival_status.is_deleted() {
        if let Some(arr) = record.arrival {
            shift_event_to(record, EventKind::Departure, arr);
        }
    }
}

fn shift_event_to(record: &mut StopTimeUpdate, kind: EventKind, floor: NaiveDateTime) {
    if record.event_status(kind).is_deleted() {
        return;
    }
    let Some(time) = record.event_time(kind) else {
        return;
    };
    if time >= floor {
        return;
    }
    let shift = floor - time;
    let delay = record.event_delay(kind).unwrap_or_else(Duration::zero) + shift;
    record.set_event(kind, Some(floor), Some(delay), record.event_status(kind));
}

/// Carry the stop's resulting departure (or arrival, for terminus-like
/// records) into the running state.
fn advance_state(state: &mut RunningState, record: &StopTimeUpdate) {
    let effective = [EventKind::Departure, EventKind::Arrival]
        .into_iter()
        .find_map(|kind| {
            if record.event_status(kind).is_deleted() {
                return None;
            }
            record.event_time(kind).map(|t| (t, record.event_delay(kind)))
        });
    if let Some((time, delay)) = effective {
        state.departure = Some(time);
        if let Some(d) = delay {
            state.delay = d;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn stop(s: &str) -> StopId {
        StopId::parse(s).unwrap()
    }

    fn base_stop(s: &str, arr: Option<NaiveDateTime>, dep: Option<NaiveDateTime>) -> ScheduledStopTime {
        ScheduledStopTime {
            stop_id: stop(s),
            arrival: arr,
            departure: dep,
        }
    }

    fn mins(m: i64) -> Duration {
        Duration::minutes(m)
    }

    #[test]
    fn synthesize_from_base_is_changed() {
        let base = base_stop("sp:1", Some(dt(10, 0)), Some(dt(10, 2)));
        let mut state = RunningState::default();

        let out = merge_stop(&stop("sp:1"), Some(&base), None, None, 0, &mut state, false);

        assert!(out.changed);
        assert_eq!(out.record.arrival, Some(dt(10, 0)));
        assert_eq!(out.record.departure, Some(dt(10, 2)));
        assert_eq!(out.record.arrival_status, EventStatus::Scheduled);
        assert_eq!(out.record.arrival_delay, Some(Duration::zero()));
        assert_eq!(state.departure, Some(dt(10, 2)));
    }

    #[test]
    fn synthesized_stop_inherits_running_delay() {
        let base = base_stop("sp:3", Some(dt(12, 0)), Some(dt(12, 2)));
        let mut state = RunningState {
            departure: Some(dt(11, 15)),
            delay: mins(15),
        };

        let out = merge_stop(&stop("sp:3"), Some(&base), None, None, 2, &mut state, false);

        assert_eq!(out.record.arrival, Some(dt(12, 15)));
        assert_eq!(out.record.departure, Some(dt(12, 17)));
        assert_eq!(out.record.arrival_delay, Some(mins(15)));
        assert_eq!(out.record.departure_delay, Some(mins(15)));
    }

    #[test]
    fn update_applies_delay_to_base_time() {
        let base = base_stop("sp:2", Some(dt(11, 0)), Some(dt(11, 0)));
        let mut proposed = StopTimeUpdate::new(stop("sp:2"), 1);
        proposed.set_event(
            EventKind::Departure,
            Some(dt(11, 15)),
            Some(mins(15)),
            EventStatus::Update,
        );
        let mut state = RunningState {
            departure: Some(dt(10, 0)),
            delay: Duration::zero(),
        };

        let out = merge_stop(&stop("sp:2"), Some(&base), None, Some(&proposed), 1, &mut state, false);

        assert_eq!(out.record.departure, Some(dt(11, 15)));
        assert_eq!(out.record.departure_delay, Some(mins(15)));
        assert_eq!(out.record.departure_status, EventStatus::Update);
        // Arrival untouched: stays on the base time.
        assert_eq!(out.record.arrival, Some(dt(11, 0)));
        assert_eq!(state.departure, Some(dt(11, 15)));
        assert_eq!(state.delay, mins(15));
    }

    #[test]
    fn only_stored_keeps_record_and_refreshes_order() {
        let mut stored = StopTimeUpdate::new(stop("sp:2"), 5);
        stored.set_event(
            EventKind::Departure,
            Some(dt(11, 10)),
            Some(mins(10)),
            EventStatus::Update,
        );
        let mut state = RunningState::default();

        let out = merge_stop(&stop("sp:2"), None, Some(&stored), None, 1, &mut state, false);

        assert!(!out.changed);
        assert_eq!(out.record.order, 1);
        assert_eq!(out.record.departure, Some(dt(11, 10)));
        assert_eq!(state.departure, Some(dt(11, 10)));
        assert_eq!(state.delay, mins(10));
    }

    #[test]
    fn identical_recompute_is_unchanged() {
        let base = base_stop("sp:2", Some(dt(11, 0)), Some(dt(11, 0)));
        let mut proposed = StopTimeUpdate::new(stop("sp:2"), 1);
        proposed.set_event(
            EventKind::Departure,
            Some(dt(11, 15)),
            Some(mins(15)),
            EventStatus::Update,
        );

        let mut state = RunningState::default();
        let first = merge_stop(&stop("sp:2"), Some(&base), None, Some(&proposed), 1, &mut state, false);
        assert!(first.changed);

        let mut state = RunningState::default();
        let second = merge_stop(
            &stop("sp:2"),
            Some(&base),
            Some(&first.record),
            Some(&proposed),
            1,
            &mut state,
            false,
        );
        assert!(!second.changed);
        assert!(second.record.same_content(&first.record));
    }

    #[test]
    fn delete_unsets_time() {
        let base = base_stop("sp:2", Some(dt(11, 0)), Some(dt(11, 2)));
        let mut proposed = StopTimeUpdate::new(stop("sp:2"), 1);
        proposed.set_event(EventKind::Arrival, None, None, EventStatus::Delete);
        proposed.set_event(EventKind::Departure, None, None, EventStatus::Delete);
        let mut state = RunningState::default();

        let out = merge_stop(&stop("sp:2"), Some(&base), None, Some(&proposed), 1, &mut state, false);

        assert_eq!(out.record.arrival, None);
        assert_eq!(out.record.departure, None);
        assert!(out.record.arrival_status.is_deleted());
        // A fully deleted stop does not move the running state.
        assert_eq!(state.departure, None);
    }

    #[test]
    fn invalid_add_is_ignored() {
        // Base already serves the arrival: an add has nothing to add to.
        let base = base_stop("sp:2", Some(dt(11, 0)), Some(dt(11, 2)));
        let mut proposed = StopTimeUpdate::new(stop("sp:2"), 1);
        proposed.set_event(
            EventKind::Arrival,
            Some(dt(11, 30)),
            None,
            EventStatus::Add,
        );
        let mut state = RunningState::default();

        let out = merge_stop(&stop("sp:2"), Some(&base), None, Some(&proposed), 1, &mut state, false);

        // Falls back to the base time, status untouched.
        assert_eq!(out.record.arrival, Some(dt(11, 0)));
        assert_eq!(out.record.arrival_status, EventStatus::Scheduled);
    }

    #[test]
    fn add_uses_proposed_time_verbatim() {
        let mut proposed = StopTimeUpdate::new(stop("sp:x"), 2);
        proposed.set_event(
            EventKind::Arrival,
            Some(dt(11, 30)),
            None,
            EventStatus::Add,
        );
        proposed.set_event(
            EventKind::Departure,
            Some(dt(11, 31)),
            None,
            EventStatus::Add,
        );
        let mut state = RunningState {
            departure: Some(dt(11, 0)),
            delay: Duration::zero(),
        };

        let out = merge_stop(&stop("sp:x"), None, None, Some(&proposed), 2, &mut state, true);

        assert_eq!(out.record.arrival, Some(dt(11, 30)));
        assert_eq!(out.record.departure, Some(dt(11, 31)));
        assert_eq!(out.record.arrival_status, EventStatus::Add);
        assert!(out.changed);
    }

    #[test]
    fn departure_pushed_to_arrival() {
        // Upstream says the departure is before the arrival: push it.
        let base = base_stop("sp:2", Some(dt(11, 0)), Some(dt(11, 2)));
        let mut proposed = StopTimeUpdate::new(stop("sp:2"), 1);
        proposed.set_event(
            EventKind::Arrival,
            Some(dt(11, 20)),
            Some(mins(20)),
            EventStatus::Update,
        );
        proposed.set_event(
            EventKind::Departure,
            Some(dt(11, 10)),
            Some(mins(8)),
            EventStatus::Update,
        );
        let mut state = RunningState::default();

        let out = merge_stop(&stop("sp:2"), Some(&base), None, Some(&proposed), 1, &mut state, false);

        // Departure resolved to 11:10 (base 11:02 + 8m), then pushed to the
        // 11:20 arrival; the 10-minute shift lands in the delay.
        assert_eq!(out.record.arrival, Some(dt(11, 20)));
        assert_eq!(out.record.departure, Some(dt(11, 20)));
        assert_eq!(out.record.departure_delay, Some(mins(18)));
    }

    #[test]
    fn events_pushed_past_previous_departure() {
        let base = base_stop("sp:3", Some(dt(11, 5)), Some(dt(11, 6)));
        let mut state = RunningState {
            departure: Some(dt(11, 30)),
            delay: Duration::zero(),
        };

        let out = merge_stop(&stop("sp:3"), Some(&base), None, None, 2, &mut state, false);

        assert_eq!(out.record.arrival, Some(dt(11, 30)));
        assert_eq!(out.record.departure, Some(dt(11, 30)));
        assert_eq!(out.record.arrival_delay, Some(mins(25)));
        assert_eq!(out.record.departure_delay, Some(mins(24)));
    }

    #[test]
    fn complete_feed_resets_stored_knowledge() {
        // Stored has a delay; the complete feed resends the stop with no
        // change, which means back-to-schedule.
        let base = base_stop("sp:2", Some(dt(11, 0)), Some(dt(11, 2)));
        let mut stored = StopTimeUpdate::new(stop("sp:2"), 1);
        stored.set_event(
            EventKind::Departure,
            Some(dt(11, 12)),
            Some(mins(10)),
            EventStatus::Update,
        );
        let proposed = StopTimeUpdate::new(stop("sp:2"), 1);
        let mut state = RunningState::default();

        let out = merge_stop(&stop("sp:2"), Some(&base), Some(&stored), Some(&proposed), 1, &mut state, true);

        assert_eq!(out.record.departure, Some(dt(11, 2)));
        assert_eq!(out.record.departure_status, EventStatus::Scheduled);
        assert!(out.changed);
    }

    #[test]
    fn differential_feed_preserves_stored_knowledge() {
        // Same setup, but a differential feed touching only the arrival:
        // the stored departure delay survives.
        let base = base_stop("sp:2", Some(dt(11, 0)), Some(dt(11, 2)));
        let mut stored = StopTimeUpdate::new(stop("sp:2"), 1);
        stored.set_event(
            EventKind::Departure,
            Some(dt(11, 12)),
            Some(mins(10)),
            EventStatus::Update,
        );
        let mut proposed = StopTimeUpdate::new(stop("sp:2"), 1);
        proposed.set_event(
            EventKind::Arrival,
            Some(dt(11, 5)),
            Some(mins(5)),
            EventStatus::Update,
        );
        let mut state = RunningState::default();

        let out = merge_stop(&stop("sp:2"), Some(&base), Some(&stored), Some(&proposed), 1, &mut state, false);

        assert_eq!(out.record.arrival, Some(dt(11, 5)));
        assert_eq!(out.record.departure, Some(dt(11, 12)));
        assert_eq!(out.record.departure_delay, Some(mins(10)));
    }
}
