//! Face-count HTTP API
//!
//! `GET /face-count` returns the latest published count. `POST /face-count`
//! overwrites it. Readers get the most recent value with no ordering
//! guarantee beyond that; `sequence` lets them tell two equal counts apart.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Latest published face count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountReading {
    pub count: u32,
    pub timestamp: DateTime<Utc>,
    pub camera_id: Option<u32>,
    /// Incremented on every publish; 0 until the first one
    pub sequence: u64,
}

/// Last-write-wins count cell
#[derive(Debug, Clone)]
pub struct CountStore {
    latest: CountReading,
}

impl CountStore {
    pub fn new() -> Self {
        Self {
            latest: CountReading {
                count: 0,
                timestamp: Utc::now(),
                camera_id: None,
                sequence: 0,
            },
        }
    }

    /// Overwrite the latest reading
    pub fn publish(&mut self, count: u32, camera_id: Option<u32>) -> &CountReading {
        self.latest = CountReading {
            count,
            timestamp: Utc::now(),
            camera_id,
            sequence: self.latest.sequence + 1,
        };
        &self.latest
    }

    pub fn latest(&self) -> &CountReading {
        &self.latest
    }
}

impl Default for CountStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub counts: CountStore,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            counts: CountStore::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Fresh state behind the shared lock
    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::new()))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedState = Arc<RwLock<AppState>>;

/// Query parameters for publishing a count
#[derive(Debug, Deserialize)]
pub struct PublishQuery {
    pub count: u32,
    pub camera_id: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    pub status: String,
    pub count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub sequence: u64,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/face-count", get(get_face_count).post(post_face_count))
        .route("/api/v1/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_face_count(State(state): State<SharedState>) -> Json<CountReading> {
    let state = state.read().await;
    Json(state.counts.latest().clone())
}

async fn post_face_count(
    State(state): State<SharedState>,
    Query(params): Query<PublishQuery>,
) -> Json<PublishResponse> {
    let mut state = state.write().await;
    let reading = state.counts.publish(params.count, params.camera_id);
    debug!(
        "Face count {} published (camera {:?}, seq {})",
        reading.count, reading.camera_id, reading.sequence
    );

    Json(PublishResponse {
        status: "success".to_string(),
        count: params.count,
    })
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let state = state.read().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        sequence: state.counts.latest().sequence,
    })
}

/// Serve the API until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    state: SharedState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Face-count API listening on {}", addr);
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
