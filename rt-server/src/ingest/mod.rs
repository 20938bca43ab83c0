//! Ingestion pipeline.
//!
//! Drives one received payload through the whole life cycle: audit the raw
//! bytes, parse, fetch base-schedule snapshots, merge against stored state,
//! persist, republish, acknowledge. Feeds from one contributor are applied
//! strictly in order; different contributors proceed in parallel.
//!
//! A payload rejected as invalid is remembered by hash, so an upstream
//! stuck resending the same broken bytes only ever produces one audit row.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::connectors::FeedConnector;
use crate::domain::{
    DateWindow, FeedStatus, RealTimeUpdate, SourceId, TripKey, TripStatus, TripUpdate,
    VehicleJourney,
};
use crate::merge;
use crate::publish::{Publisher, build_feed};
use crate::schedule::ScheduleProvider;
use crate::store::TripStore;

pub mod coord;
pub mod error;

pub use coord::{CoordConfig, CoordStore, FailureRecord, MemoryCoordStore};
pub use error::IngestError;

/// Outcome of one successfully processed payload.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub audit_id: u64,
    /// Every trip occurrence the payload referenced.
    pub trips: Vec<TripKey>,
    /// How many of them actually changed.
    pub changed: usize,
    /// The payload was valid but every merge was a no-op.
    pub no_new_information: bool,
}

/// The ingestion pipeline and its collaborators.
pub struct IngestPipeline<S, T, P, K> {
    connectors: HashMap<SourceId, Arc<dyn FeedConnector>>,
    schedule: Arc<S>,
    store: Arc<T>,
    publisher: Arc<P>,
    coord: Arc<K>,
}

impl<S, T, P, K> IngestPipeline<S, T, P, K>
where
    S: ScheduleProvider,
    T: TripStore,
    P: Publisher,
    K: CoordStore,
{
    pub fn new(schedule: Arc<S>, store: Arc<T>, publisher: Arc<P>, coord: Arc<K>) -> Self {
        Self {
            connectors: HashMap::new(),
            schedule,
            store,
            publisher,
            coord,
        }
    }

    /// Register a connector under its contributor id.
    pub fn with_connector(mut self, connector: Arc<dyn FeedConnector>) -> Self {
        self.connectors.insert(connector.source().clone(), connector);
        self
    }

    /// Contributors this pipeline accepts feeds for.
    pub fn sources(&self) -> impl Iterator<Item = &SourceId> {
        self.connectors.keys()
    }

    /// The underlying store, for read-only status queries.
    pub fn store(&self) -> &Arc<T> {
        &self.store
    }

    /// Process one raw payload for one contributor.
    pub async fn process(
        &self,
        source: &SourceId,
        raw: Vec<u8>,
    ) -> Result<IngestReport, IngestError> {
        let connector = self
            .connectors
            .get(source)
            .ok_or_else(|| IngestError::InputInvalid(format!("unknown contributor {source}")))?
            .clone();

        if !self.coord.try_lock(source).await {
            return Err(IngestError::Internal(format!(
                "another feed from {source} is being applied"
            )));
        }
        let result = self.process_locked(connector.as_ref(), source, raw).await;
        self.coord.unlock(source).await;
        result
    }

    async fn process_locked(
        &self,
        connector: &dyn FeedConnector,
        source: &SourceId,
        raw: Vec<u8>,
    ) -> Result<IngestReport, IngestError> {
        let dedupe_key = seahash::hash(&raw);
        if let Some(prev) = self.coord.recorded_failure(source, dedupe_key).await {
            debug!(source = %source, audit_id = prev.audit_id, "identical invalid payload resent");
            self.store.touch_audit(prev.audit_id, Utc::now()).await?;
            return Err(IngestError::InputInvalid(prev.error));
        }

        // The raw bytes are retained verbatim before any parsing, so even
        // garbage input leaves an audit trail.
        let audit_id = self
            .store
            .insert_audit(RealTimeUpdate::received(source.clone(), raw.clone(), Utc::now()))
            .await?;

        let proposed = match connector.parse(&raw) {
            Ok(trips) => trips,
            Err(e) => {
                return self
                    .reject(source, dedupe_key, audit_id, IngestError::from(e))
                    .await;
            }
        };
        let keys: Vec<TripKey> = proposed.iter().map(|t| t.key()).collect();

        let journeys = match self.fetch_journeys(&proposed).await {
            Ok(journeys) => journeys,
            Err(e @ IngestError::InputInvalid(_)) => {
                return self.reject(source, dedupe_key, audit_id, e).await;
            }
            Err(e) => return self.fail(audit_id, keys, e).await,
        };

        let stored = match self.store.find_batch(&keys).await {
            Ok(stored) => stored,
            Err(e) => return self.fail(audit_id, keys, e.into()).await,
        };

        let mut merged = Vec::new();
        for (trip, vj) in proposed.iter().zip(&journeys) {
            match merge::merge(vj, stored.get(&trip.key()), trip, connector.is_complete()) {
                Ok(Some(m)) => merged.push(m),
                Ok(None) => {
                    debug!(trip = %trip.trip_id, "merge is a no-op");
                }
                Err(e) => {
                    warn!(trip = %trip.trip_id, error = %e, "trip rejected by merge, skipping");
                }
            }
        }

        let changed: Vec<TripUpdate> = merged.iter().map(|m| m.trip.clone()).collect();
        let no_new_information = changed.is_empty();

        if !no_new_information {
            if let Err(e) = self.store.commit(audit_id, merged, Utc::now()).await {
                return self.fail(audit_id, keys, e.into()).await;
            }
        }

        // Even a vacuous ingestion publishes: the empty document doubles as
        // a liveness signal for consumers.
        let payload = match build_feed(source, &changed, Utc::now()) {
            Ok(payload) => payload,
            Err(e) => return self.fail(audit_id, keys, IngestError::Internal(e.to_string())).await,
        };
        if let Err(e) = self.publisher.publish(source, &payload).await {
            return self.fail(audit_id, keys, e.into()).await;
        }

        if no_new_information {
            self.store
                .finalize_audit(
                    audit_id,
                    FeedStatus::Ok,
                    Some("no new information".to_string()),
                    keys.clone(),
                    Utc::now(),
                )
                .await?;
        }

        info!(
            source = %source,
            audit_id,
            trips = keys.len(),
            changed = changed.len(),
            "feed applied"
        );
        Ok(IngestReport {
            audit_id,
            trips: keys,
            changed: changed.len(),
            no_new_information,
        })
    }

    /// Fetch the base-schedule snapshot for every referenced trip, in the
    /// order the trips appear in the feed.
    async fn fetch_journeys(
        &self,
        proposed: &[TripUpdate],
    ) -> Result<Vec<VehicleJourney>, IngestError> {
        let mut journeys = Vec::with_capacity(proposed.len());
        for trip in proposed {
            match self.schedule.lookup(&trip.trip_id, trip.date).await? {
                Some(vj) => journeys.push(vj),
                // An added trip is unknown to the base schedule by
                // definition; its feed defines the stop list.
                None if trip.status == TripStatus::Add => {
                    let window = DateWindow::around(trip.date)
                        .map_err(|e| IngestError::InputInvalid(e.to_string()))?;
                    journeys.push(VehicleJourney::new(
                        trip.trip_id.clone(),
                        trip.date,
                        Vec::new(),
                        window,
                    ));
                }
                None => {
                    return Err(IngestError::InputInvalid(format!(
                        "trip {} on {} is unknown to the base schedule",
                        trip.trip_id, trip.date
                    )));
                }
            }
        }
        Ok(journeys)
    }

    /// Final rejection of invalid input: remembered for dedupe, audit row
    /// finalized as `Warning`.
    async fn reject(
        &self,
        source: &SourceId,
        dedupe_key: u64,
        audit_id: u64,
        err: IngestError,
    ) -> Result<IngestReport, IngestError> {
        self.coord
            .record_failure(
                source,
                dedupe_key,
                FailureRecord {
                    audit_id,
                    error: err.to_string(),
                },
            )
            .await;
        self.fail(audit_id, Vec::new(), err).await
    }

    /// Finalize the audit row with the error's status and propagate it.
    async fn fail(
        &self,
        audit_id: u64,
        trips: Vec<TripKey>,
        err: IngestError,
    ) -> Result<IngestReport, IngestError> {
        if let Err(e) = self
            .store
            .finalize_audit(
                audit_id,
                err.feed_status(),
                Some(err.to_string()),
                trips,
                Utc::now(),
            )
            .await
        {
            error!(audit_id, error = %e, "failed to finalize audit row");
        }
        Err(err)
    }
}
