//! In-memory store.
//!
//! Keeps audit rows and merged trip state in maps behind one `RwLock`. The
//! single write lock is the serialization point: `commit` re-checks each
//! trip's `replaces_existing` flag under the lock, so two pipelines racing
//! on the same trip occurrence cannot both win.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{FeedStatus, RealTimeUpdate, SourceId, TripKey, TripUpdate};
use crate::merge::MergedTrip;

use super::{StoreError, TripStore};

#[derive(Default)]
struct Inner {
    next_id: u64,
    audits: HashMap<u64, RealTimeUpdate>,
    trips: HashMap<TripKey, TripUpdate>,
}

/// Map-backed [`TripStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current merged state for one trip occurrence.
    pub async fn trip(&self, key: &TripKey) -> Option<TripUpdate> {
        self.inner.read().await.trips.get(key).cloned()
    }

    /// One audit row by id.
    pub async fn audit(&self, id: u64) -> Option<RealTimeUpdate> {
        self.inner.read().await.audits.get(&id).cloned()
    }

    /// Number of trip occurrences currently holding realtime state.
    pub async fn trip_count(&self) -> usize {
        self.inner.read().await.trips.len()
    }
}

impl TripStore for MemoryStore {
    async fn insert_audit(&self, mut update: RealTimeUpdate) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        update.id = Some(id);
        inner.audits.insert(id, update);
        Ok(id)
    }

    async fn finalize_audit(
        &self,
        id: u64,
        status: FeedStatus,
        error: Option<String>,
        trips: Vec<TripKey>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let audit = inner
            .audits
            .get_mut(&id)
            .ok_or(StoreError::AuditMissing { id })?;
        audit.status = status;
        audit.error = error;
        audit.trips = trips;
        audit.updated_at = now;
        Ok(())
    }

    async fn touch_audit(&self, id: u64, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let audit = inner
            .audits
            .get_mut(&id)
            .ok_or(StoreError::AuditMissing { id })?;
        audit.updated_at = now;
        Ok(())
    }

    async fn find_batch(
        &self,
        keys: &[TripKey],
    ) -> Result<HashMap<TripKey, TripUpdate>, StoreError> {
        let inner = self.inner.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| inner.trips.get(k).map(|t| (k.clone(), t.clone())))
            .collect())
    }

    async fn commit(
        &self,
        audit_id: u64,
        merged: Vec<MergedTrip>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.audits.contains_key(&audit_id) {
            return Err(StoreError::AuditMissing { id: audit_id });
        }

        // Validate the whole batch before touching anything.
        for m in &merged {
            let key = m.trip.key();
            if inner.trips.contains_key(&key) != m.replaces_existing {
                return Err(StoreError::Conflict { trip: key });
            }
        }

        let keys: Vec<TripKey> = merged.iter().map(|m| m.trip.key()).collect();
        for m in merged {
            inner.trips.insert(m.trip.key(), m.trip);
        }

        let audit = inner
            .audits
            .get_mut(&audit_id)
            .ok_or(StoreError::AuditMissing { id: audit_id })?;
        audit.status = FeedStatus::Ok;
        audit.error = None;
        audit.trips = keys;
        audit.updated_at = now;
        Ok(())
    }

    async fn last_audit(&self, source: &SourceId) -> Result<Option<RealTimeUpdate>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .audits
            .values()
            .filter(|a| &a.source == source)
            .max_by_key(|a| (a.created_at, a.id))
            .cloned())
    }
}
