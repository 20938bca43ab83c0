//! Wire representation of a base-schedule trip and its conversion to the
//! domain snapshot. Shared by the HTTP client and the file-backed mock.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::domain::{DateWindow, ScheduledCall, StopId, TripId, VehicleJourney};

use super::ScheduleError;

/// One trip as served by the schedule backend. Times are UTC times-of-day;
/// the pass-midnight resolution happens downstream, on the domain snapshot.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JourneyDto {
    pub trip_id: String,
    pub calls: Vec<CallDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CallDto {
    pub stop_id: String,
    #[serde(default)]
    pub arrival: Option<String>,
    #[serde(default)]
    pub departure: Option<String>,
}

pub(super) fn convert_journey(
    dto: JourneyDto,
    date: NaiveDate,
) -> Result<VehicleJourney, ScheduleError> {
    let trip_id = TripId::parse(&dto.trip_id).map_err(|e| ScheduleError::Data {
        message: e.to_string(),
    })?;
    let window = DateWindow::around(date).map_err(|e| ScheduleError::Data {
        message: e.to_string(),
    })?;

    let calls = dto
        .calls
        .into_iter()
        .map(|c| {
            Ok(ScheduledCall {
                stop_id: StopId::parse(&c.stop_id).map_err(|e| ScheduleError::Data {
                    message: e.to_string(),
                })?,
                arrival: c.arrival.as_deref().map(parse_time).transpose()?,
                departure: c.departure.as_deref().map(parse_time).transpose()?,
            })
        })
        .collect::<Result<Vec<_>, ScheduleError>>()?;

    if calls.is_empty() {
        return Err(ScheduleError::Data {
            message: format!("trip {trip_id} has no scheduled calls"),
        });
    }

    Ok(VehicleJourney::new(trip_id, date, calls, window))
}

fn parse_time(value: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S").map_err(|_| ScheduleError::Data {
        message: format!("unparseable scheduled time {value:?}"),
    })
}
