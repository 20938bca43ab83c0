//! Persistence of realtime state.
//!
//! Two kinds of rows are stored: the audit trail of every received payload
//! ([`RealTimeUpdate`]) and the current merged state per trip occurrence
//! ([`TripUpdate`]). The store is the only stateful collaborator of the
//! ingestion pipeline; everything else is recomputed per feed.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::domain::{FeedStatus, RealTimeUpdate, SourceId, TripKey, TripUpdate};
use crate::merge::MergedTrip;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("no audit row with id {id}")]
    AuditMissing { id: u64 },

    #[error("conflicting write for trip {trip_id} on {date}", trip_id = .trip.trip_id, date = .trip.date)]
    Conflict { trip: TripKey },
}

/// Storage backend for audit rows and merged trip state.
///
/// `commit` must be atomic per call: either all merged trips land together
/// with their audit row finalized, or none do.
pub trait TripStore: Send + Sync {
    /// Record a newly received payload. Returns the audit row id.
    fn insert_audit(
        &self,
        update: RealTimeUpdate,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Set the final status of an audit row once processing ends.
    fn finalize_audit(
        &self,
        id: u64,
        status: FeedStatus,
        error: Option<String>,
        trips: Vec<TripKey>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Refresh an audit row's `updated_at`, for deduplicated repeats.
    fn touch_audit(
        &self,
        id: u64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch the stored state for a batch of trip occurrences in one query.
    fn find_batch(
        &self,
        keys: &[TripKey],
    ) -> impl Future<Output = Result<HashMap<TripKey, TripUpdate>, StoreError>> + Send;

    /// Atomically persist the merged trips and finalize their audit row.
    ///
    /// Each trip's `replaces_existing` flag is checked against the current
    /// contents; a mismatch means a concurrent writer got there first and
    /// the whole commit is rejected.
    fn commit(
        &self,
        audit_id: u64,
        merged: Vec<MergedTrip>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The most recent audit row for one contributor, if any.
    fn last_audit(
        &self,
        source: &SourceId,
    ) -> impl Future<Output = Result<Option<RealTimeUpdate>, StoreError>> + Send;
}
