//! Per-stop realtime records.

use chrono::{Duration, NaiveDateTime};

use super::StopId;

/// Which half of a stop-time an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Arrival,
    Departure,
}

/// Realtime status of a single stop-event (one arrival or one departure).
///
/// `Scheduled` means no realtime change has been recorded for the event;
/// the base-schedule time stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Scheduled,
    Update,
    Add,
    Delete,
    AddedForDetour,
    DeletedForDetour,
}

impl EventStatus {
    /// Whether this status removes the event from service.
    pub fn is_deleted(self) -> bool {
        matches!(self, EventStatus::Delete | EventStatus::DeletedForDetour)
    }

    /// Whether this status introduces an event absent from the base schedule.
    pub fn is_added(self) -> bool {
        matches!(self, EventStatus::Add | EventStatus::AddedForDetour)
    }
}

/// One stop record inside a [`TripUpdate`](super::TripUpdate).
///
/// `order` is dense, 0-based and unique within a trip; after a successful
/// merge the orders of a trip's records are exactly `0..N`. Deleted events
/// carry no time (the stop identity alone identifies what was removed);
/// the scheduled time remains recoverable from the base schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTimeUpdate {
    pub stop_id: StopId,
    pub order: u32,
    pub arrival: Option<NaiveDateTime>,
    pub departure: Option<NaiveDateTime>,
    pub arrival_delay: Option<Duration>,
    pub departure_delay: Option<Duration>,
    pub arrival_status: EventStatus,
    pub departure_status: EventStatus,
    pub message: Option<String>,
}

impl StopTimeUpdate {
    /// A record with no realtime knowledge for either event.
    pub fn new(stop_id: StopId, order: u32) -> Self {
        Self {
            stop_id,
            order,
            arrival: None,
            departure: None,
            arrival_delay: None,
            departure_delay: None,
            arrival_status: EventStatus::Scheduled,
            departure_status: EventStatus::Scheduled,
            message: None,
        }
    }

    pub fn event_time(&self, kind: EventKind) -> Option<NaiveDateTime> {
        match kind {
            EventKind::Arrival => self.arrival,
            EventKind::Departure => self.departure,
        }
    }

    pub fn event_delay(&self, kind: EventKind) -> Option<Duration> {
        match kind {
            EventKind::Arrival => self.arrival_delay,
            EventKind::Departure => self.departure_delay,
        }
    }

    pub fn event_status(&self, kind: EventKind) -> EventStatus {
        match kind {
            EventKind::Arrival => self.arrival_status,
            EventKind::Departure => self.departure_status,
        }
    }

    /// Overwrite one event's time, delay and status.
    pub fn set_event(
        &mut self,
        kind: EventKind,
        time: Option<NaiveDateTime>,
        delay: Option<Duration>,
        status: EventStatus,
    ) {
        match kind {
            EventKind::Arrival => {
                self.arrival = time;
                self.arrival_delay = delay;
                self.arrival_status = status;
            }
            EventKind::Departure => {
                self.departure = time;
                self.departure_delay = delay;
                self.departure_status = status;
            }
        }
    }

    /// Whether the record carries any realtime knowledge for the event:
    /// a non-`Scheduled` status, an explicit time, or an explicit delay.
    pub fn has_event(&self, kind: EventKind) -> bool {
        self.event_status(kind) != EventStatus::Scheduled
            || self.event_time(kind).is_some()
            || self.event_delay(kind).is_some()
    }

    /// Invariant check: departure must not precede arrival when both are
    /// known and neither event is deleted.
    pub fn is_locally_consistent(&self) -> bool {
        if self.arrival_status.is_deleted() || self.departure_status.is_deleted() {
            return true;
        }
        match (self.arrival, self.departure) {
            (Some(arr), Some(dep)) => dep >= arr,
            _ => true,
        }
    }

    /// Field-wise comparison ignoring `order`.
    ///
    /// Used by the merge to decide whether a recomputed record differs from
    /// the stored one; a bare order refresh is not a change.
    pub fn same_content(&self, other: &Self) -> bool {
        self.stop_id == other.stop_id
            && self.arrival == other.arrival
            && self.departure == other.departure
            && self.arrival_delay == other.arrival_delay
            && self.departure_delay == other.departure_delay
            && self.arrival_status == other.arrival_status
            && self.departure_status == other.departure_status
            && self.message == other.message
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

    #[test]
    fn status_predicates() {
        assert!(EventStatus::Delete.is_deleted());
        assert!(EventStatus::DeletedForDetour.is_deleted());
        assert!(!EventStatus::Update.is_deleted());

        assert!(EventStatus::Add.is_added());
        assert!(EventStatus::AddedForDetour.is_added());
        assert!(!EventStatus::Scheduled.is_added());
    }

    #[test]
    fn new_record_has_no_events() {
        let stu = StopTimeUpdate::new(stop("sp:1"), 0);
        assert!(!stu.has_event(EventKind::Arrival));
        assert!(!stu.has_event(EventKind::Departure));
        assert!(stu.is_locally_consistent());
    }

    #[test]
    fn set_and_read_event() {
        let mut stu = StopTimeUpdate::new(stop("sp:1"), 0);
        stu.set_event(
            EventKind::Departure,
            Some(dt(10, 15)),
            Some(Duration::minutes(15)),
            EventStatus::Update,
        );

        assert_eq!(stu.event_time(EventKind::Departure), Some(dt(10, 15)));
        assert_eq!(
            stu.event_delay(EventKind::Departure),
            Some(Duration::minutes(15))
        );
        assert_eq!(stu.event_status(EventKind::Departure), EventStatus::Update);
        assert!(stu.has_event(EventKind::Departure));
        assert!(!stu.has_event(EventKind::Arrival));
    }

    #[test]
    fn local_consistency() {
        let mut stu = StopTimeUpdate::new(stop("sp:1"), 0);
        stu.arrival = Some(dt(10, 0));
        stu.departure = Some(dt(10, 2));
        assert!(stu.is_locally_consistent());

        stu.departure = Some(dt(9, 58));
        assert!(!stu.is_locally_consistent());

        // A deleted event suspends the check.
        stu.departure_status = EventStatus::Delete;
        assert!(stu.is_locally_consistent());
    }

    #[test]
    fn same_content_ignores_order() {
        let mut a = StopTimeUpdate::new(stop("sp:1"), 0);
        a.arrival = Some(dt(10, 0));
        let mut b = a.clone();
        b.order = 7;
        assert!(a.same_content(&b));

        b.arrival = Some(dt(10, 1));
        assert!(!a.same_content(&b));
    }
}
