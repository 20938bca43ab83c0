//! HTTP schedule client.
//!
//! Queries the navigation backend for base-schedule trip snapshots. Handles
//! authentication, concurrency limiting and conversion to domain types.

use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::Semaphore;

use crate::domain::{TripId, VehicleJourney};

use super::wire::{JourneyDto, convert_journey};
use super::{ScheduleError, ScheduleProvider};

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Configuration for the schedule client.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Base URL of the schedule API.
    pub base_url: String,
    /// Authorization token, sent verbatim in the `authorization` header.
    pub token: Option<String>,
    /// Maximum concurrent requests.
    pub max_concurrent: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ScheduleConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Schedule API client.
///
/// Uses a semaphore to limit concurrent requests; every merge triggers a
/// lookup and feeds can reference many trips at once.
#[derive(Debug, Clone)]
pub struct HttpScheduleProvider {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl HttpScheduleProvider {
    pub fn new(config: ScheduleConfig) -> Result<Self, ScheduleError> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = config.token {
            let value = HeaderValue::from_str(token).map_err(|_| ScheduleError::Api {
                status: 0,
                message: "invalid token format".to_string(),
            })?;
            headers.insert("authorization", value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }
}

impl ScheduleProvider for HttpScheduleProvider {
    async fn lookup(
        &self,
        trip_id: &TripId,
        date: NaiveDate,
    ) -> Result<Option<VehicleJourney>, ScheduleError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ScheduleError::Api {
                status: 0,
                message: "semaphore closed".to_string(),
            })?;

        let url = format!("{}/vehicle_journeys/{}", self.base_url, trip_id.as_str());
        let response = self
            .http
            .get(&url)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ScheduleError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScheduleError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScheduleError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let dto: JourneyDto = serde_json::from_str(&body).map_err(|e| ScheduleError::Data {
            message: format!("{e} (body: {})", body.chars().take(500).collect::<String>()),
        })?;

        convert_journey(dto, date).map(Some)
    }
}
