//! Cross-feed coordination.
//!
//! Two concerns that outlive a single pipeline run: serializing ingestion
//! per contributor (feeds from one source must apply in order) and
//! remembering recently rejected payloads so an upstream stuck resending
//! the same broken bytes does not grow the audit trail unboundedly.

use std::future::Future;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tokio::sync::Mutex;

use crate::domain::SourceId;

/// What is remembered about a rejected payload.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Audit row of the first rejection; repeats only touch it.
    pub audit_id: u64,
    pub error: String,
}

/// Coordination backend.
pub trait CoordStore: Send + Sync {
    /// Look up a remembered rejection for this exact payload.
    fn recorded_failure(
        &self,
        source: &SourceId,
        key: u64,
    ) -> impl Future<Output = Option<FailureRecord>> + Send;

    /// Remember a rejection.
    fn record_failure(
        &self,
        source: &SourceId,
        key: u64,
        record: FailureRecord,
    ) -> impl Future<Output = ()> + Send;

    /// Claim exclusive ingestion for a contributor. Returns false when
    /// another feed from the same contributor is mid-flight.
    fn try_lock(&self, source: &SourceId) -> impl Future<Output = bool> + Send;

    /// Release a claim taken with [`CoordStore::try_lock`].
    fn unlock(&self, source: &SourceId) -> impl Future<Output = ()> + Send;
}

/// Configuration for the in-memory coordination store.
#[derive(Debug, Clone)]
pub struct CoordConfig {
    /// How long a rejection is remembered.
    pub failure_ttl: Duration,

    /// Maximum number of remembered rejections.
    pub failure_capacity: u64,
}

impl Default for CoordConfig {
    fn default() -> Self {
        Self {
            failure_ttl: Duration::from_secs(600),
            failure_capacity: 1_000,
        }
    }
}

/// In-process [`CoordStore`].
pub struct MemoryCoordStore {
    locked: Mutex<std::collections::HashSet<SourceId>>,
    failures: MokaCache<(SourceId, u64), FailureRecord>,
}

impl MemoryCoordStore {
    pub fn new(config: &CoordConfig) -> Self {
        let failures = MokaCache::builder()
            .time_to_live(config.failure_ttl)
            .max_capacity(config.failure_capacity)
            .build();
        Self {
            locked: Mutex::new(std::collections::HashSet::new()),
            failures,
        }
    }
}

impl Default for MemoryCoordStore {
    fn default() -> Self {
        Self::new(&CoordConfig::default())
    }
}

impl CoordStore for MemoryCoordStore {
    async fn recorded_failure(&self, source: &SourceId, key: u64) -> Option<FailureRecord> {
        self.failures.get(&(source.clone(), key)).await
    }

    async fn record_failure(&self, source: &SourceId, key: u64, record: FailureRecord) {
        self.failures.insert((source.clone(), key), record).await;
    }

    async fn try_lock(&self, source: &SourceId) -> bool {
        self.locked.lock().await.insert(source.clone())
    }

    async fn unlock(&self, source: &SourceId) {
        self.locked.lock().await.remove(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(s: &str) -> SourceId {
        SourceId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn lock_is_exclusive_per_source() {
        let coord = MemoryCoordStore::default();
        let a = source("feed.a");
        let b = source("feed.b");

        assert!(coord.try_lock(&a).await);
        assert!(!coord.try_lock(&a).await);
        // Another contributor is unaffected.
        assert!(coord.try_lock(&b).await);

        coord.unlock(&a).await;
        assert!(coord.try_lock(&a).await);
    }

    #[tokio::test]
    async fn failures_are_remembered_per_source_and_key() {
        let coord = MemoryCoordStore::default();
        let a = source("feed.a");
        let record = FailureRecord {
            audit_id: 7,
            error: "malformed payload".into(),
        };

        coord.record_failure(&a, 42, record).await;

        let hit = coord.recorded_failure(&a, 42).await.unwrap();
        assert_eq!(hit.audit_id, 7);

        assert!(coord.recorded_failure(&a, 43).await.is_none());
        assert!(coord.recorded_failure(&source("feed.b"), 42).await.is_none());
    }
}
