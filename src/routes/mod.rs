// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::models::CycleReport;
use crate::store::MetricsStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<MetricsStore>,
    pub(crate) cycle_tx: broadcast::Sender<CycleReport>,
}

pub fn app(store: Arc<MetricsStore>, cycle_tx: broadcast::Sender<CycleReport>) -> Router {
    let state = AppState { store, cycle_tx };
    Router::new()
        .route("/", get(http::dashboard_handler)) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/status", get(http::api_status_handler)) // GET /api/status
        .route("/api/status/{key}", get(http::api_device_handler)) // GET /api/status/{name|address}
        .route("/api/summary", get(http::api_summary_handler)) // GET /api/summary
        .route("/ws/status", get(ws::ws_status)) // WS /ws/status
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
