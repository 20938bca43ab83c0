//! Caching layer for base-schedule lookups.
//!
//! One ingested feed frequently references the same trip occurrence several
//! times in quick succession (retries, chatty contributors), and the base
//! schedule only changes on data reloads. A short TTL keeps the snapshots
//! fresh enough while sparing the backend.
//!
//! Only found journeys are cached: a trip missing from one fetch may appear
//! after a schedule reload, and negative answers must not stick.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache as MokaCache;

use crate::domain::{TripId, VehicleJourney};

use super::{ScheduleError, ScheduleProvider};

/// Cache key: one trip occurrence.
type JourneyKey = (TripId, NaiveDate);

/// Configuration for the schedule cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached snapshots.
    pub ttl: Duration,

    /// Maximum number of cached snapshots.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 10_000,
        }
    }
}

/// Schedule provider with caching.
///
/// Wraps any inner provider and memoizes successful lookups.
pub struct CachedScheduleProvider<P> {
    inner: P,
    journeys: MokaCache<JourneyKey, Arc<VehicleJourney>>,
}

impl<P: ScheduleProvider> CachedScheduleProvider<P> {
    pub fn new(inner: P, config: &CacheConfig) -> Self {
        let journeys = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();
        Self { inner, journeys }
    }

    /// Number of cached snapshots (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.journeys.entry_count()
    }

    /// Drop all cached snapshots, forcing fresh fetches.
    pub fn invalidate_all(&self) {
        self.journeys.invalidate_all();
    }
}

impl<P: ScheduleProvider> ScheduleProvider for CachedScheduleProvider<P> {
    async fn lookup(
        &self,
        trip_id: &TripId,
        date: NaiveDate,
    ) -> Result<Option<VehicleJourney>, ScheduleError> {
        let key = (trip_id.clone(), date);
        if let Some(hit) = self.journeys.get(&key).await {
            return Ok(Some((*hit).clone()));
        }

        match self.inner.lookup(trip_id, date).await? {
            Some(vj) => {
                self.journeys.insert(key, Arc::new(vj.clone())).await;
                Ok(Some(vj))
            }
            None => Ok(None),
        }
    }
}
