//! HTTP route handlers.

use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::domain::{FeedStatus, SourceId, TripKey};
use crate::ingest::{CoordStore, IngestError, IngestReport};
use crate::publish::Publisher;
use crate::schedule::ScheduleProvider;
use crate::store::TripStore;

use super::state::AppState;

/// Create the application router.
pub fn create_router<S, T, P, K>(state: AppState<S, T, P, K>) -> Router
where
    S: ScheduleProvider + 'static,
    T: TripStore + 'static,
    P: Publisher + 'static,
    K: CoordStore + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status::<S, T, P, K>))
        .route("/feeds/:source", post(ingest_feed::<S, T, P, K>))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    audit_id: u64,
    status: &'static str,
    trips: Vec<TripRef>,
    changed: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TripRef {
    trip_id: String,
    date: chrono::NaiveDate,
}

impl From<&TripKey> for TripRef {
    fn from(key: &TripKey) -> Self {
        Self {
            trip_id: key.trip_id.as_str().to_string(),
            date: key.date,
        }
    }
}

impl From<IngestReport> for IngestResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            audit_id: report.audit_id,
            status: if report.no_new_information {
                "no_new_information"
            } else {
                "ok"
            },
            trips: report.trips.iter().map(TripRef::from).collect(),
            changed: report.changed,
        }
    }
}

/// Ingest one raw feed payload for a contributor.
async fn ingest_feed<S, T, P, K>(
    State(state): State<AppState<S, T, P, K>>,
    Path(source): Path<String>,
    body: Bytes,
) -> Result<Json<IngestResponse>, AppError>
where
    S: ScheduleProvider,
    T: TripStore,
    P: Publisher,
    K: CoordStore,
{
    let source = SourceId::parse(&source).map_err(|e| AppError::BadRequest {
        message: format!("invalid contributor id: {e}"),
    })?;

    let report = state.pipeline.process(&source, body.to_vec()).await?;
    Ok(Json(IngestResponse::from(report)))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    contributors: Vec<ContributorStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContributorStatus {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Per-contributor summary of the most recent ingestion.
async fn status<S, T, P, K>(
    State(state): State<AppState<S, T, P, K>>,
) -> Result<Json<StatusResponse>, AppError>
where
    S: ScheduleProvider,
    T: TripStore,
    P: Publisher,
    K: CoordStore,
{
    let mut contributors = Vec::new();
    for source in state.pipeline.sources() {
        let last = state
            .pipeline
            .store()
            .last_audit(source)
            .await
            .map_err(|e| AppError::Internal {
                message: e.to_string(),
            })?;
        contributors.push(ContributorStatus {
            source: source.as_str().to_string(),
            last_status: last.as_ref().map(|a| feed_status_name(a.status)),
            last_error: last.as_ref().and_then(|a| a.error.clone()),
            updated_at: last.as_ref().map(|a| a.updated_at),
        });
    }
    contributors.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(Json(StatusResponse { contributors }))
}

fn feed_status_name(status: FeedStatus) -> &'static str {
    match status {
        FeedStatus::Ok => "ok",
        FeedStatus::Ko => "ko",
        FeedStatus::Warning => "warning",
        FeedStatus::Pending => "pending",
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Internal { message: String },
    BadGateway { message: String },
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        let message = e.to_string();
        match e {
            IngestError::InputInvalid(_) => AppError::BadRequest { message },
            IngestError::Internal(_) => AppError::Internal { message },
            IngestError::PublishFailure(_) => AppError::BadGateway { message },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
            AppError::BadGateway { message } => (StatusCode::BAD_GATEWAY, message),
        };

        error!(%status, %message, "request failed");

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
