//! Differential feed document.
//!
//! Encodes the trips one ingestion actually changed. Times are absolute
//! UTC datetimes (pass-midnight already resolved), delays are seconds, and
//! statuses use the same snake_case names as the ingestion format.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::domain::{
    Effect, EventKind, EventStatus, SourceId, StopTimeUpdate, TripStatus, TripUpdate,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDocument {
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub trips: Vec<TripDoc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDoc {
    trip_id: String,
    date: NaiveDate,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    effect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    physical_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headsign: Option<String>,
    stop_times: Vec<StopDoc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDoc {
    stop_id: String,
    order: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrival: Option<EventDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    departure: Option<EventDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_seconds: Option<i64>,
    status: &'static str,
}

/// Encode the changed trips of one ingestion as a feed document.
///
/// An empty trip list is legal and yields a document with no entities;
/// consumers treat it as a heartbeat.
pub fn build_feed(
    source: &SourceId,
    trips: &[TripUpdate],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, serde_json::Error> {
    let document = FeedDocument {
        source: source.as_str().to_string(),
        generated_at,
        trips: trips.iter().map(trip_doc).collect(),
    };
    serde_json::to_vec(&document)
}

fn trip_doc(trip: &TripUpdate) -> TripDoc {
    TripDoc {
        trip_id: trip.trip_id.as_str().to_string(),
        date: trip.date,
        status: trip_status_name(trip.status),
        effect: trip.effect.map(effect_name),
        message: trip.message.clone(),
        company: trip.company.clone(),
        physical_mode: trip.physical_mode.clone(),
        headsign: trip.headsign.clone(),
        stop_times: trip.stop_time_updates.iter().map(stop_doc).collect(),
    }
}

fn stop_doc(stu: &StopTimeUpdate) -> StopDoc {
    StopDoc {
        stop_id: stu.stop_id.as_str().to_string(),
        order: stu.order,
        arrival: event_doc(stu, EventKind::Arrival),
        departure: event_doc(stu, EventKind::Departure),
        message: stu.message.clone(),
    }
}

fn event_doc(stu: &StopTimeUpdate, kind: EventKind) -> Option<EventDoc> {
    if !stu.has_event(kind) {
        return None;
    }
    Some(EventDoc {
        time: stu.event_time(kind),
        delay_seconds: stu.event_delay(kind).map(|d| d.num_seconds()),
        status: event_status_name(stu.event_status(kind)),
    })
}

fn trip_status_name(status: TripStatus) -> &'static str {
    match status {
        TripStatus::Scheduled => "scheduled",
        TripStatus::Update => "update",
        TripStatus::Add => "add",
        TripStatus::Delete => "delete",
    }
}

fn event_status_name(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Scheduled => "scheduled",
        EventStatus::Update => "update",
        EventStatus::Add => "add",
        EventStatus::Delete => "delete",
        EventStatus::AddedForDetour => "added_for_detour",
        EventStatus::DeletedForDetour => "deleted_for_detour",
    }
}

fn effect_name(effect: Effect) -> &'static str {
    match effect {
        Effect::NoService => "no_service",
        Effect::ReducedService => "reduced_service",
        Effect::SignificantDelays => "significant_delays",
        Effect::Detour => "detour",
        Effect::AdditionalService => "additional_service",
        Effect::ModifiedService => "modified_service",
        Effect::OtherEffect => "other_effect",
        Effect::UnknownEffect => "unknown_effect",
        Effect::StopMoved => "stop_moved",
    }
}
