//! JSON disruption feed.
//!
//! Wire format: a document with a `trips` array; each trip carries its
//! circulation date, a trip-level status/effect, and per-stop events with
//! UTC times-of-day (`"HH:MM:SS"`) and delays in seconds. Times-of-day are
//! resolved to absolute datetimes with the same pass-midnight rule as the
//! base schedule: a decrease along the stop sequence advances the date by
//! one day.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::domain::{
    Effect, EventKind, EventStatus, SourceId, StopId, StopTimeUpdate, TimelineCursor, TripId,
    TripStatus, TripUpdate,
};

use super::{FeedConnector, ParseError};

/// Connector for the JSON disruption format.
///
/// The same format is spoken by complete and differential contributors;
/// `complete` records which convention this source follows.
pub struct JsonConnector {
    source: SourceId,
    complete: bool,
}

impl JsonConnector {
    pub fn new(source: SourceId, complete: bool) -> Self {
        Self { source, complete }
    }
}

impl FeedConnector for JsonConnector {
    fn source(&self) -> &SourceId {
        &self.source
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<TripUpdate>, ParseError> {
        let feed: FeedDto = serde_json::from_slice(raw)?;
        if feed.trips.is_empty() {
            return Err(ParseError::EmptyFeed);
        }
        feed.trips
            .into_iter()
            .map(|t| convert_trip(t, &self.source))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FeedDto {
    trips: Vec<TripDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TripDto {
    trip_id: String,
    date: NaiveDate,
    status: TripStatusDto,
    #[serde(default)]
    effect: Option<EffectDto>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    physical_mode: Option<String>,
    #[serde(default)]
    headsign: Option<String>,
    #[serde(default)]
    stop_times: Vec<StopTimeDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StopTimeDto {
    stop_id: String,
    #[serde(default)]
    arrival: Option<EventDto>,
    #[serde(default)]
    departure: Option<EventDto>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EventDto {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    delay_seconds: Option<i64>,
    status: EventStatusDto,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TripStatusDto {
    Scheduled,
    Update,
    Add,
    Delete,
}

impl From<TripStatusDto> for TripStatus {
    fn from(dto: TripStatusDto) -> Self {
        match dto {
            TripStatusDto::Scheduled => TripStatus::Scheduled,
            TripStatusDto::Update => TripStatus::Update,
            TripStatusDto::Add => TripStatus::Add,
            TripStatusDto::Delete => TripStatus::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EventStatusDto {
    Scheduled,
    Update,
    Add,
    Delete,
    AddedForDetour,
    DeletedForDetour,
}

impl From<EventStatusDto> for EventStatus {
    fn from(dto: EventStatusDto) -> Self {
        match dto {
            EventStatusDto::Scheduled => EventStatus::Scheduled,
            EventStatusDto::Update => EventStatus::Update,
            EventStatusDto::Add => EventStatus::Add,
            EventStatusDto::Delete => EventStatus::Delete,
            EventStatusDto::AddedForDetour => EventStatus::AddedForDetour,
            EventStatusDto::DeletedForDetour => EventStatus::DeletedForDetour,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EffectDto {
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

impl From<EffectDto> for Effect {
    fn from(dto: EffectDto) -> Self {
        match dto {
            EffectDto::NoService => Effect::NoService,
            EffectDto::ReducedService => Effect::ReducedService,
            EffectDto::SignificantDelays => Effect::SignificantDelays,
            EffectDto::Detour => Effect::Detour,
            EffectDto::AdditionalService => Effect::AdditionalService,
            EffectDto::ModifiedService => Effect::ModifiedService,
            EffectDto::OtherEffect => Effect::OtherEffect,
            EffectDto::UnknownEffect => Effect::UnknownEffect,
            EffectDto::StopMoved => Effect::StopMoved,
        }
    }
}

/// Largest delay accepted from the wire. Larger values are upstream garbage
/// and would overflow the datetime arithmetic downstream.
const MAX_DELAY_SECONDS: i64 = 2 * 24 * 3600;

fn parse_delay(seconds: i64) -> Result<Duration, ParseError> {
    if !(-MAX_DELAY_SECONDS..=MAX_DELAY_SECONDS).contains(&seconds) {
        return Err(ParseError::Delay { seconds });
    }
    Ok(Duration::seconds(seconds))
}

fn convert_trip(dto: TripDto, source: &SourceId) -> Result<TripUpdate, ParseError> {
    let mut trip = TripUpdate::new(TripId::parse(&dto.trip_id)?, dto.date, source.clone());
    trip.status = dto.status.into();
    trip.effect = dto.effect.map(Into::into);
    trip.message = dto.message;
    trip.company = dto.company;
    trip.physical_mode = dto.physical_mode;
    trip.headsign = dto.headsign;

    let mut cursor = TimelineCursor::new(dto.date);
    for (order, st) in dto.stop_times.into_iter().enumerate() {
        let mut stu = StopTimeUpdate::new(StopId::parse(&st.stop_id)?, order as u32);
        for (kind, event) in [
            (EventKind::Arrival, st.arrival),
            (EventKind::Departure, st.departure),
        ] {
            let Some(event) = event else { continue };
            let time = match event.time {
                Some(ref value) => {
                    let tod = NaiveTime::parse_from_str(value, "%H:%M:%S").map_err(|_| {
                        ParseError::Time {
                            value: value.clone(),
                        }
                    })?;
                    Some(cursor.next(tod)?)
                }
                None => None,
            };
            let delay = event.delay_seconds.map(parse_delay).transpose()?;
            stu.set_event(kind, time, delay, event.status.into());
        }
        stu.message = st.message;
        trip.stop_time_updates.push(stu);
    }

    Ok(trip)
}
