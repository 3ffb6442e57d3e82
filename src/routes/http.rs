// GET handlers: dashboard, version, device status, summary

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};

use super::AppState;
use crate::models::DeviceStatus;
use crate::version::{DESCRIPTION, NAME, VERSION};

const DASHBOARD_HTML: &str = include_str!("../../static/index.html");

/// GET / — static dashboard page; it polls /api/status and /api/summary itself.
pub(super) async fn dashboard_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
        "description": DESCRIPTION,
    }))
}

/// GET /api/status — every device in config order with its latest result (null before the first poll).
pub(super) async fn api_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.store.get_all().await)
}

/// GET /api/status/{key} — one device by name, or by "host:port" / "host" when no name matches.
pub(super) async fn api_device_handler(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<axum::Json<DeviceStatus>, StatusCode> {
    let device = state
        .store
        .registry()
        .lookup(&key)
        .ok_or(StatusCode::NOT_FOUND)?;
    let status = state
        .store
        .get_all()
        .await
        .into_iter()
        .find(|d| d.name == device.name)
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(axum::Json(status))
}

/// GET /api/summary — online/offline counts and averages over online devices.
pub(super) async fn api_summary_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.store.summary().await)
}
