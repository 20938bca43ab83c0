//! Base-schedule access.
//!
//! The base schedule is owned by an external navigation backend; this module
//! fetches read-only [`VehicleJourney`] snapshots from it. A snapshot is
//! fetched fresh for every merge so the realtime state is always reconciled
//! against current theory.

use std::future::Future;

use chrono::NaiveDate;

use crate::domain::{TripId, VehicleJourney};

pub mod cache;
pub mod client;
pub mod mock;
mod wire;

pub use cache::{CacheConfig, CachedScheduleProvider};
pub use client::{HttpScheduleProvider, ScheduleConfig};
pub use mock::MockScheduleProvider;

/// Errors from schedule lookups.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("schedule api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unauthorized (invalid schedule token)")]
    Unauthorized,

    #[error("rate limited by the schedule api")]
    RateLimited,

    #[error("schedule payload unusable: {message}")]
    Data { message: String },
}

/// Read-only source of base-schedule trip snapshots.
pub trait ScheduleProvider: Send + Sync {
    /// Fetch the base-schedule snapshot for one trip occurrence.
    ///
    /// The lookup covers the circulation date plus one day either side, so
    /// pass-midnight trips are found from both adjacent dates. `Ok(None)`
    /// means the trip is unknown to the base schedule, which is an input
    /// problem, not an internal one.
    fn lookup(
        &self,
        trip_id: &TripId,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<VehicleJourney>, ScheduleError>> + Send;
}
