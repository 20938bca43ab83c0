//! Feed connectors.
//!
//! A connector owns everything specific to one upstream feed format:
//! deserializing the raw payload and mapping it onto the internal trip
//! model. Everything downstream of [`FeedConnector::parse`] is
//! format-agnostic.

use crate::domain::{InvalidId, SourceId, TimeError, TripUpdate};

pub mod json;

pub use json::JsonConnector;

/// A payload the connector could not turn into trip updates. The feed is
/// rejected as a whole; a payload is either parseable or it is not.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("feed contains no trip updates")]
    EmptyFeed,

    #[error(transparent)]
    Id(#[from] InvalidId),

    #[error("unparseable time of day {value:?}")]
    Time { value: String },

    #[error("delay of {seconds}s is out of range")]
    Delay { seconds: i64 },

    #[error(transparent)]
    Timeline(#[from] TimeError),
}

/// One upstream feed format.
///
/// Implementations must be cheap to call concurrently; `parse` is pure.
pub trait FeedConnector: Send + Sync {
    /// The contributor this connector ingests for.
    fn source(&self) -> &SourceId;

    /// Whether the format always describes the full trip (as opposed to a
    /// differential format that only sends what changed).
    fn is_complete(&self) -> bool;

    /// Decode one raw payload into trip updates.
    fn parse(&self, raw: &[u8]) -> Result<Vec<TripUpdate>, ParseError>;
}
