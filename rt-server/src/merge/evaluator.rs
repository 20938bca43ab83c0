//! Stop-event evaluation.
//!
//! For a single stop-event (one arrival or one departure), decides whether
//! the event is currently served and whether a proposed change makes sense
//! given what is already known. Resolution order is always
//! new data > stored state > base schedule.

use crate::domain::EventStatus;

/// Whether a stop-event is currently served.
///
/// Served if the new data says the event is not deleted; failing new data,
/// if the stored state has the event, served iff not deleted there; failing
/// both, served iff the base schedule publishes a time for the event.
pub fn is_served(
    new: Option<EventStatus>,
    stored: Option<EventStatus>,
    base_has_event: bool,
) -> bool {
    if let Some(status) = new {
        return !status.is_deleted();
    }
    if let Some(status) = stored {
        return !status.is_deleted();
    }
    base_has_event
}

/// Whether a proposed status is a valid change for this stop-event.
///
/// - No proposed status is never a valid change.
/// - A repeat of the exact stored status is accepted idempotently.
/// - An add is invalid if the event is already served by an earlier source
///   (nothing to add to).
/// - A non-add modification is invalid if the event was never served
///   anywhere (nothing to modify).
///
/// Invalid occurrences are the caller's to log; the stop is skipped, not
/// the whole feed.
pub fn is_valid_change(
    new: Option<EventStatus>,
    stored: Option<EventStatus>,
    base_has_event: bool,
) -> bool {
    let Some(new) = new else {
        return false;
    };
    if stored == Some(new) {
        return true;
    }
    let already_served = is_served(None, stored, base_has_event);
    if new.is_added() {
        !already_served
    } else {
        already_served
    }
}
