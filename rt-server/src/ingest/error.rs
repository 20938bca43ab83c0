//! Ingestion error taxonomy.
//!
//! Three families matter to callers and to the audit trail:
//! - `InputInvalid`: the payload itself is at fault; retrying the identical
//!   bytes can never succeed;
//! - `Internal`: something on our side failed, assumed transient;
//! - `PublishFailure`: the merge was persisted but downstream did not hear
//!   about it yet.

use crate::connectors::ParseError;
use crate::domain::FeedStatus;
use crate::publish::PublishError;
use crate::schedule::ScheduleError;
use crate::store::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("publish failure: {0}")]
    PublishFailure(String),
}

impl IngestError {
    /// The audit status this error leaves behind. Invalid input is final
    /// (`Warning`); everything else is assumed transient (`Ko`).
    pub fn feed_status(&self) -> FeedStatus {
        match self {
            IngestError::InputInvalid(_) => FeedStatus::Warning,
            IngestError::Internal(_) | IngestError::PublishFailure(_) => FeedStatus::Ko,
        }
    }

    /// Whether resubmitting the identical payload could change the outcome.
    pub fn is_reprocessable(&self) -> bool {
        !matches!(self, IngestError::InputInvalid(_))
    }
}

impl From<ParseError> for IngestError {
    fn from(err: ParseError) -> Self {
        IngestError::InputInvalid(err.to_string())
    }
}

impl From<ScheduleError> for IngestError {
    fn from(err: ScheduleError) -> Self {
        IngestError::Internal(err.to_string())
    }
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        IngestError::Internal(err.to_string())
    }
}

impl From<PublishError> for IngestError {
    fn from(err: PublishError) -> Self {
        IngestError::PublishFailure(err.to_string())
    }
}
