//! Timeline handling for trip reconciliation.
//!
//! The base schedule publishes stop times as UTC times-of-day; a trip that
//! crosses midnight ("pass-midnight") has times that numerically decrease
//! along the stop sequence. `TimelineCursor` maps such a sequence onto
//! absolute datetimes, advancing the date whenever a time-of-day is smaller
//! than its predecessor. The same cursor is used for the base-schedule walk
//! and for resolving times-of-day arriving on the realtime wire.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Error returned when a timeline walk cannot produce a valid datetime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timeline: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// The date range a base-schedule lookup should cover.
///
/// Wide enough to contain the whole trip occurrence, including the following
/// day for pass-midnight trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window around a circulation date: the day before through the day
    /// after, covering pass-midnight trips in both directions.
    pub fn around(date: NaiveDate) -> Result<Self, TimeError> {
        let start = date
            .pred_opt()
            .ok_or_else(|| TimeError::new("date underflow"))?;
        let end = date
            .succ_opt()
            .ok_or_else(|| TimeError::new("date overflow"))?;
        Ok(Self { start, end })
    }

    /// Whether the window contains the given date.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Maps a forward sequence of times-of-day onto absolute datetimes.
///
/// Whenever a time-of-day is numerically smaller than the previous one in
/// the sequence, the walk has crossed midnight and the date advances by one
/// day. Equal times stay on the same day (a zero-dwell stop is common).
///
/// # Examples
///
/// ```
/// use rt_server::domain::TimelineCursor;
/// use chrono::{NaiveDate, NaiveTime};
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// let mut cursor = TimelineCursor::new(date);
///
/// let t1 = cursor.next(NaiveTime::from_hms_opt(23, 50, 0).unwrap()).unwrap();
/// let t2 = cursor.next(NaiveTime::from_hms_opt(0, 10, 0).unwrap()).unwrap();
///
/// assert_eq!(t1.date(), date);
/// assert_eq!(t2.date(), date.succ_opt().unwrap());
/// assert!(t2 > t1);
/// ```
#[derive(Debug, Clone)]
pub struct TimelineCursor {
    date: NaiveDate,
    prev: Option<NaiveTime>,
}

impl TimelineCursor {
    /// Start a walk on the given circulation date.
    pub fn new(date: NaiveDate) -> Self {
        Self { date, prev: None }
    }

    /// Resolve the next time-of-day in the sequence to an absolute datetime.
    pub fn next(&mut self, time: NaiveTime) -> Result<NaiveDateTime, TimeError> {
        if let Some(prev) = self.prev {
            if time < prev {
                self.date = self
                    .date
                    .succ_opt()
                    .ok_or_else(|| TimeError::new("date overflow"))?;
            }
        }
        self.prev = Some(time);
        Ok(self.date.and_time(time))
    }

    /// Resolve an optional time-of-day, preserving `None`.
    ///
    /// Absent events do not move the cursor.
    pub fn next_opt(&mut self, time: Option<NaiveTime>) -> Result<Option<NaiveDateTime>, TimeError> {
        match time {
            Some(t) => self.next(t).map(Some),
            None => Ok(None),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn valid_date()(
            year in 2000i32..2100,
            month in 1u32..=12,
            day in 1u32..=28
        ) -> NaiveDate {
            NaiveDate::from_ymd_opt(year, month, day).unwrap()
        }
    }

    prop_compose! {
        fn valid_time()(hour in 0u32..24, minute in 0u32..60) -> NaiveTime {
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
        }
    }

    proptest! {
        /// The resolved datetime sequence never decreases.
        #[test]
        fn walk_is_monotonic(
            times in prop::collection::vec(valid_time(), 1..20),
            date in valid_date()
        ) {
            let mut cursor = TimelineCursor::new(date);
            let mut prev: Option<NaiveDateTime> = None;
            for t in times {
                let dt = cursor.next(t).unwrap();
                if let Some(p) = prev {
                    prop_assert!(dt >= p);
                }
                prev = Some(dt);
            }
        }

        /// A non-decreasing time-of-day sequence stays on the start date.
        #[test]
        fn sorted_walk_stays_on_start_date(
            mut times in prop::collection::vec(valid_time(), 1..20),
            date in valid_date()
        ) {
            times.sort();
            let mut cursor = TimelineCursor::new(date);
            for t in times {
                let dt = cursor.next(t).unwrap();
                prop_assert_eq!(dt.date(), date);
            }
        }

        /// Each decrease advances the date by exactly one day.
        #[test]
        fn decreases_advance_one_day_each(
            times in prop::collection::vec(valid_time(), 2..20),
            date in valid_date()
        ) {
            let decreases = times
                .windows(2)
                .filter(|w| w[1] < w[0])
                .count() as i64;

            let mut cursor = TimelineCursor::new(date);
            let mut last = None;
            for t in &times {
                last = Some(cursor.next(*t).unwrap());
            }

            let expected = date
                .checked_add_days(chrono::Days::new(decreases as u64))
                .unwrap();
            prop_assert_eq!(last.unwrap().date(), expected);
        }
    }
}
