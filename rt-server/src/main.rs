use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rt_server::connectors::JsonConnector;
use rt_server::domain::SourceId;
use rt_server::ingest::{IngestPipeline, MemoryCoordStore};
use rt_server::publish::{HttpPublisher, LogPublisher, PublishError, Publisher};
use rt_server::schedule::{
    CacheConfig, CachedScheduleProvider, HttpScheduleProvider, MockScheduleProvider,
    ScheduleConfig, ScheduleProvider,
};
use rt_server::store::MemoryStore;
use rt_server::web::{AppState, create_router};

/// Publisher chosen at startup from the environment.
enum AnyPublisher {
    Http(HttpPublisher),
    Log(LogPublisher),
}

impl Publisher for AnyPublisher {
    async fn publish(&self, source: &SourceId, payload: &[u8]) -> Result<(), PublishError> {
        match self {
            AnyPublisher::Http(p) => p.publish(source, payload).await,
            AnyPublisher::Log(p) => p.publish(source, payload).await,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let publisher = match std::env::var("PUBLISH_URL") {
        Ok(url) => AnyPublisher::Http(
            HttpPublisher::new(url).expect("failed to create publisher"),
        ),
        Err(_) => {
            warn!("PUBLISH_URL not set; merged feeds will only be logged");
            AnyPublisher::Log(LogPublisher)
        }
    };

    match std::env::var("MOCK_SCHEDULE_DIR") {
        Ok(dir) => {
            info!(dir = %dir, "using mock schedule data");
            let schedule =
                MockScheduleProvider::new(&dir).expect("failed to load mock schedule data");
            run(schedule, publisher).await;
        }
        Err(_) => {
            let url = std::env::var("SCHEDULE_URL")
                .expect("SCHEDULE_URL or MOCK_SCHEDULE_DIR must be set");
            let mut config = ScheduleConfig::new(url);
            if let Ok(token) = std::env::var("SCHEDULE_TOKEN") {
                config = config.with_token(token);
            } else {
                warn!("SCHEDULE_TOKEN not set; schedule lookups may be rejected");
            }
            let client =
                HttpScheduleProvider::new(config).expect("failed to create schedule client");
            let schedule = CachedScheduleProvider::new(client, &CacheConfig::default());
            run(schedule, publisher).await;
        }
    }
}

async fn run<S: ScheduleProvider + 'static>(schedule: S, publisher: AnyPublisher) {
    let mut pipeline = IngestPipeline::new(
        Arc::new(schedule),
        Arc::new(MemoryStore::new()),
        Arc::new(publisher),
        Arc::new(MemoryCoordStore::default()),
    );

    // SOURCES is a comma-separated list of `id:mode` entries, where mode is
    // `complete` or `differential` (the default).
    let sources =
        std::env::var("SOURCES").unwrap_or_else(|_| "feed.default:differential".to_string());
    for entry in sources.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, mode) = match entry.split_once(':') {
            Some((name, mode)) => (name, mode),
            None => (entry, "differential"),
        };
        let source = SourceId::parse(name).expect("invalid contributor id in SOURCES");
        let complete = match mode {
            "complete" => true,
            "differential" => false,
            other => panic!("invalid feed mode {other:?} in SOURCES"),
        };
        info!(source = %source, complete, "registering contributor");
        pipeline = pipeline.with_connector(Arc::new(JsonConnector::new(source, complete)));
    }

    let state = AppState::new(pipeline);
    let app = create_router(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()
        .expect("invalid BIND_ADDR");
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
