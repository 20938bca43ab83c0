//! Audit records for ingested payloads.

use chrono::{DateTime, Utc};

use super::{SourceId, TripKey};

/// Processing status of one ingested payload.
///
/// `Warning` marks invalid input (reprocessing the identical payload is
/// pointless); `Ko` marks a failure assumed transient (reprocessing is
/// allowed); `Pending` is the initial state before the feed has been fully
/// processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Ok,
    Ko,
    Warning,
    Pending,
}

/// Append-only audit record of one ingested raw payload.
///
/// Created as soon as the payload is received, before parsing, so that
/// unparseable input is retained verbatim. Only `status`, `error`,
/// `updated_at` and the touched-trip list are mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealTimeUpdate {
    /// Row id, assigned by the store on insert.
    pub id: Option<u64>,
    pub source: SourceId,
    pub raw: Vec<u8>,
    pub status: FeedStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Trip occurrences this payload produced or touched.
    pub trips: Vec<TripKey>,
}

impl RealTimeUpdate {
    /// A fresh audit record in the `Pending` state, raw bytes verbatim.
    pub fn received(source: SourceId, raw: Vec<u8>, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            source,
            raw,
            status: FeedStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
            trips: Vec::new(),
        }
    }
}
