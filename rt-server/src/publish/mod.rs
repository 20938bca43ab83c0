//! Republication of merged state.
//!
//! After a feed is persisted, the trips it changed are re-encoded as a
//! differential document and handed to a [`Publisher`]. Downstream
//! consumers only ever see merged, consistent state, never the raw
//! upstream payloads.

use std::future::Future;

use tracing::info;

use crate::domain::SourceId;

pub mod feed;

pub use feed::{FeedDocument, build_feed};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("publish endpoint error {status}: {message}")]
    Endpoint { status: u16, message: String },
}

/// Sink for the differential feed.
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        source: &SourceId,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Publisher that POSTs the document to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    http: reqwest::Client,
    url: String,
}

impl HttpPublisher {
    pub fn new(url: impl Into<String>) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

impl Publisher for HttpPublisher {
    async fn publish(&self, source: &SourceId, payload: &[u8]) -> Result<(), PublishError> {
        let response = self
            .http
            .post(&self.url)
            .header("content-type", "application/json")
            .header("x-contributor", source.as_str())
            .body(payload.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Endpoint {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(())
    }
}

/// Publisher that only logs, for running without a downstream consumer.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    async fn publish(&self, source: &SourceId, payload: &[u8]) -> Result<(), PublishError> {
        info!(source = %source, bytes = payload.len(), "feed published");
        Ok(())
    }
}

/// Capturing publisher for tests.
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    published: std::sync::Arc<tokio::sync::Mutex<Vec<(SourceId, Vec<u8>)>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn take(&self) -> Vec<(SourceId, Vec<u8>)> {
        std::mem::take(&mut *self.published.lock().await)
    }
}

impl Publisher for MemoryPublisher {
    async fn publish(&self, source: &SourceId, payload: &[u8]) -> Result<(), PublishError> {
        self.published
            .lock()
            .await
            .push((source.clone(), payload.to_vec()));
        Ok(())
    }
}
