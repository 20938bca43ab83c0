//! Application state for the web layer.

use std::sync::Arc;

use crate::ingest::IngestPipeline;

/// Shared application state: the ingestion pipeline and everything it
/// already holds (schedule access, store, publisher, coordination).
pub struct AppState<S, T, P, K> {
    pub pipeline: Arc<IngestPipeline<S, T, P, K>>,
}

impl<S, T, P, K> AppState<S, T, P, K> {
    pub fn new(pipeline: IngestPipeline<S, T, P, K>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

// Derived Clone would demand Clone of the type parameters; only the Arc is
// actually cloned.
impl<S, T, P, K> Clone for AppState<S, T, P, K> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
        }
    }
}
