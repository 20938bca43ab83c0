//! Mock schedule provider for development and testing.
//!
//! Loads trip snapshots from JSON files and serves them for any requested
//! date, so no live schedule backend is needed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{TripId, VehicleJourney};

use super::wire::{CallDto, JourneyDto, convert_journey};
use super::{ScheduleError, ScheduleProvider};

/// Schedule provider backed by a directory of JSON files.
///
/// Expects files named `{trip_id}.json`, each holding one journey document.
#[derive(Clone)]
pub struct MockScheduleProvider {
    journeys: Arc<HashMap<TripId, Vec<CallDto>>>,
}

impl MockScheduleProvider {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        let data_dir = data_dir.as_ref();
        let mut journeys = HashMap::new();

        let entries = std::fs::read_dir(data_dir).map_err(|e| ScheduleError::Data {
            message: format!("failed to read mock data directory: {e}"),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| ScheduleError::Data {
                message: format!("failed to read directory entry: {e}"),
            })?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let json = std::fs::read_to_string(&path).map_err(|e| ScheduleError::Data {
                message: format!("failed to read {path:?}: {e}"),
            })?;
            let dto: JourneyDto = serde_json::from_str(&json).map_err(|e| ScheduleError::Data {
                message: format!("failed to parse {path:?}: {e}"),
            })?;
            let trip_id = TripId::parse(&dto.trip_id).map_err(|e| ScheduleError::Data {
                message: format!("invalid trip id in {path:?}: {e}"),
            })?;

            journeys.insert(trip_id, dto.calls);
        }

        if journeys.is_empty() {
            return Err(ScheduleError::Data {
                message: format!("no mock journey files found in {data_dir:?}"),
            });
        }

        Ok(Self {
            journeys: Arc::new(journeys),
        })
    }
}

impl ScheduleProvider for MockScheduleProvider {
    async fn lookup(
        &self,
        trip_id: &TripId,
        date: NaiveDate,
    ) -> Result<Option<VehicleJourney>, ScheduleError> {
        let Some(calls) = self.journeys.get(trip_id) else {
            return Ok(None);
        };
        let dto = JourneyDto {
            trip_id: trip_id.as_str().to_string(),
            calls: calls
                .iter()
                .map(|c| CallDto {
                    stop_id: c.stop_id.clone(),
                    arrival: c.arrival.clone(),
                    departure: c.departure.clone(),
                })
                .collect(),
        };
        convert_journey(dto, date).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_journey(dir: &Path, trip_id: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(format!("{trip_id}.json"))).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn serves_journeys_from_files() {
        let dir = tempfile::tempdir().unwrap();
        write_journey(
            dir.path(),
            "vj:1",
            r#"{
                "tripId": "vj:1",
                "calls": [
                    {"stopId": "sp:1", "departure": "10:00:00"},
                    {"stopId": "sp:2", "arrival": "11:00:00"}
                ]
            }"#,
        );

        let mock = MockScheduleProvider::new(dir.path()).unwrap();
        let trip = TripId::parse("vj:1").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let vj = mock.lookup(&trip, date).await.unwrap().unwrap();
        assert_eq!(vj.circulation_date, date);
        assert_eq!(vj.calls.len(), 2);

        let unknown = TripId::parse("vj:2").unwrap();
        assert!(mock.lookup(&unknown, date).await.unwrap().is_none());
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MockScheduleProvider::new(dir.path()),
            Err(ScheduleError::Data { .. })
        ));
    }
}
