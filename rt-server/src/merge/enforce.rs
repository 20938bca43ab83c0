//! Full-trip consistency post-pass.
//!
//! Runs after the per-stop walk over the complete merged stop list. Fills
//! the gaps the walk could not (missing arrivals, departures and delays)
//! and guarantees end-to-end monotonic timing: every non-deleted event must
//! not precede the previous non-deleted event. Events shifted forward carry
//! the shift into their recorded delay, so the reported delay stays
//! consistent with the absolute time.

use chrono::{Duration, NaiveDateTime};

use crate::domain::{EventKind, StopId, StopTimeUpdate};

/// A trip whose timing cannot be repaired: an arrival is missing and no
/// fallback (own departure, previous stop's arrival) exists. The whole trip
/// is rejected; sibling trips in the same feed are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stop {index} ({stop_id}) has no recoverable arrival time")]
pub struct TripInconsistent {
    pub index: usize,
    pub stop_id: StopId,
}

/// Repair and verify the merged stop list in place.
///
/// Returns whether anything was mutated, so the caller can count enforcer
/// repairs toward the trip's changed flag.
pub fn enforce(stops: &mut [StopTimeUpdate]) -> Result<bool, TripInconsistent> {
    let mut modified = false;
    let mut prev_arrival: Option<NaiveDateTime> = None;
    let mut prev_event: Option<NaiveDateTime> = None;

    for index in 0..stops.len() {
        let stop = &mut stops[index];

        // Fill missing times: arrival from departure, else from the
        // previous stop's arrival; departure from arrival.
        if !stop.arrival_status.is_deleted() && stop.arrival.is_none() {
            let fallback = stop.departure.or(prev_arrival);
            match fallback {
                Some(t) => {
                    stop.arrival = Some(t);
                    modified = true;
                }
                None => {
                    return Err(TripInconsistent {
                        index,
                        stop_id: stop.stop_id.clone(),
                    });
                }
            }
        }
        if !stop.departure_status.is_deleted() && stop.departure.is_none() {
            if stop.arrival.is_some() {
                stop.departure = stop.arrival;
                modified = true;
            }
        }

        // Missing delays default to zero.
        for kind in [EventKind::Arrival, EventKind::Departure] {
            if !stop.event_status(kind).is_deleted()
                && stop.event_time(kind).is_some()
                && stop.event_delay(kind).is_none()
            {
                stop.set_event(
                    kind,
                    stop.event_time(kind),
                    Some(Duration::zero()),
                    stop.event_status(kind),
                );
                modified = true;
            }
        }

        // Monotonicity over non-deleted events, in timeline order.
        for kind in [EventKind::Arrival, EventKind::Departure] {
            if stop.event_status(kind).is_deleted() {
                continue;
            }
            let Some(time) = stop.event_time(kind) else {
                continue;
            };
            if let Some(prev) = prev_event {
                if time < prev {
                    let shift = prev - time;
                    let delay = stop.event_delay(kind).unwrap_or_else(Duration::zero) + shift;
                    stop.set_event(kind, Some(prev), Some(delay), stop.event_status(kind));
                    modified = true;
                }
            }
            prev_event = stop.event_time(kind);
        }

        if !stop.arrival_status.is_deleted() {
            if let Some(arr) = stop.arrival {
                prev_arrival = Some(arr);
            }
        }
    }

    Ok(modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventStatus;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn stop_id(i: usize) -> StopId {
        StopId::parse(&format!("sp:{i}")).unwrap()
    }

    fn stu(i: usize, arr: Option<NaiveDateTime>, dep: Option<NaiveDateTime>) -> StopTimeUpdate {
        let mut s = StopTimeUpdate::new(stop_id(i), i as u32);
        s.arrival = arr;
        s.departure = dep;
        s
    }

    fn mins(m: i64) -> Duration {
        Duration::minutes(m)
    }

    #[test]
    fn consistent_trip_is_untouched() {
        let mut stops = vec![
            {
                let mut s = stu(0, Some(dt(10, 0)), Some(dt(10, 0)));
                s.arrival_delay = Some(Duration::zero());
                s.departure_delay = Some(Duration::zero());
                s
            },
            {
                let mut s = stu(1, Some(dt(11, 0)), Some(dt(11, 2)));
                s.arrival_delay = Some(Duration::zero());
                s.departure_delay = Some(Duration::zero());
                s
            },
        ];
        let before = stops.clone();

        let modified = enforce(&mut stops).unwrap();

        assert!(!modified);
        assert_eq!(stops, before);
    }

    #[test]
    fn missing_arrival_defaults_to_departure() {
        let mut stops = vec![stu(0, None, Some(dt(10, 0)))];
        let modified = enforce(&mut stops).unwrap();

        assert!(modified);
        assert_eq!(stops[0].arrival, Some(dt(10, 0)));
    }

    #[test]
    fn missing_arrival_defaults_to_previous_arrival() {
        let mut stops = vec![stu(0, Some(dt(10, 0)), Some(dt(10, 1))), stu(1, None, None)];
        let modified = enforce(&mut stops).unwrap();

        assert!(modified);
        assert_eq!(stops[1].arrival, Some(dt(10, 1)));
        // Departure then defaults to the filled arrival... after the
        // monotonic pass it lands on the same instant.
        assert_eq!(stops[1].departure, stops[1].arrival);
    }

    #[test]
    fn unrecoverable_arrival_rejects_trip() {
        let mut stops = vec![stu(0, None, None)];
        let err = enforce(&mut stops).unwrap_err();

        assert_eq!(err.index, 0);
        assert_eq!(err.stop_id, stop_id(0));
    }

    #[test]
    fn missing_delays_default_to_zero() {
        let mut stops = vec![stu(0, Some(dt(10, 0)), Some(dt(10, 0)))];
        enforce(&mut stops).unwrap();

        assert_eq!(stops[0].arrival_delay, Some(Duration::zero()));
        assert_eq!(stops[0].departure_delay, Some(Duration::zero()));
    }

    #[test]
    fn backwards_event_is_shifted_with_delay_conservation() {
        let mut stops = vec![
            stu(0, Some(dt(10, 0)), Some(dt(10, 30))),
            // Arrives "before" the previous departure: shifted forward by
            // 10 minutes, and the delay grows by exactly those 10 minutes.
            {
                let mut s = stu(1, Some(dt(10, 20)), Some(dt(10, 40)));
                s.arrival_delay = Some(mins(5));
                s
            },
        ];

        let modified = enforce(&mut stops).unwrap();

        assert!(modified);
        assert_eq!(stops[1].arrival, Some(dt(10, 30)));
        assert_eq!(stops[1].arrival_delay, Some(mins(15)));
        assert_eq!(stops[1].departure, Some(dt(10, 40)));
    }

    #[test]
    fn deleted_events_are_skipped() {
        let mut stops = vec![
            stu(0, Some(dt(10, 0)), Some(dt(10, 30))),
            {
                let mut s = StopTimeUpdate::new(stop_id(1), 1);
                s.arrival_status = EventStatus::Delete;
                s.departure_status = EventStatus::Delete;
                s
            },
            stu(2, Some(dt(11, 0)), Some(dt(11, 1))),
        ];

        enforce(&mut stops).unwrap();

        // The deleted stop keeps no times and does not break the chain.
        assert_eq!(stops[1].arrival, None);
        assert_eq!(stops[1].departure, None);
        assert_eq!(stops[2].arrival, Some(dt(11, 0)));
    }

    #[test]
    fn enforce_is_idempotent() {
        let mut stops = vec![
            stu(0, None, Some(dt(10, 0))),
            stu(1, Some(dt(9, 50)), None),
        ];

        let first = enforce(&mut stops).unwrap();
        assert!(first);

        let after_first = stops.clone();
        let second = enforce(&mut stops).unwrap();

        assert!(!second);
        assert_eq!(stops, after_first);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn mins_to_dt(m: i64) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(m)
    }

    fn arbitrary_trip() -> impl Strategy<Value = Vec<StopTimeUpdate>> {
        prop::collection::vec(
            (
                prop::option::of(0i64..2880),
                prop::option::of(0i64..2880),
            ),
            1..8,
        )
        .prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(i, (arr, dep))| {
                    let mut s = StopTimeUpdate::new(
                        StopId::parse(&format!("sp:{i}")).unwrap(),
                        i as u32,
                    );
                    s.arrival = arr.map(mins_to_dt);
                    s.departure = dep.map(mins_to_dt);
                    s
                })
                .collect()
        })
    }

    proptest! {
        /// After a successful pass, every non-deleted event sequence is
        /// monotonic and all delays are filled.
        #[test]
        fn output_is_monotonic_and_filled(mut stops in arbitrary_trip()) {
            if enforce(&mut stops).is_err() {
                // Rejection is a legal outcome for unrecoverable input.
                return Ok(());
            }

            let mut prev: Option<NaiveDateTime> = None;
            for stop in &stops {
                for kind in [EventKind::Arrival, EventKind::Departure] {
                    if stop.event_status(kind).is_deleted() {
                        continue;
                    }
                    let time = stop.event_time(kind);
                    prop_assert!(time.is_some());
                    prop_assert!(stop.event_delay(kind).is_some());
                    if let (Some(t), Some(p)) = (time, prev) {
                        prop_assert!(t >= p);
                    }
                    prev = time;
                }
            }
        }

        /// A second pass over already-enforced data changes nothing.
        #[test]
        fn pass_is_idempotent(mut stops in arbitrary_trip()) {
            if enforce(&mut stops).is_err() {
                return Ok(());
            }
            let snapshot = stops.clone();
            let modified = enforce(&mut stops).unwrap();
            prop_assert!(!modified);
            prop_assert_eq!(stops, snapshot);
        }

        /// Forward shifts conserve delay: shifted time minus original time
        /// equals delay growth.
        #[test]
        fn shifts_conserve_delay(mut stops in arbitrary_trip()) {
            let original = stops.clone();
            if enforce(&mut stops).is_err() {
                return Ok(());
            }
            for (before, after) in original.iter().zip(stops.iter()) {
                for kind in [EventKind::Arrival, EventKind::Departure] {
                    if let (Some(t0), Some(t1)) =
                        (before.event_time(kind), after.event_time(kind))
                    {
                        let shift = t1 - t0;
                        let d0 = before.event_delay(kind).unwrap_or_else(Duration::zero);
                        let d1 = after.event_delay(kind).unwrap_or_else(Duration::zero);
                        prop_assert_eq!(d1 - d0, shift);
                    }
                }
            }
        }
    }
}
