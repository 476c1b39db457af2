//! API routes for envirod.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use enviro_common::{HistoryEntry, Reading};
use serde::Serialize;
use tracing::error;

use crate::server::AppState;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Station Routes
// ============================================================================

pub fn station_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/stations", get(list_stations))
        .route("/api/latest/:station_id", get(latest_reading))
        .route("/api/history/:sensor_type", get(sensor_history))
}

async fn list_stations(
    State(state): State<AppStateArc>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let stations = state.query.list_stations().await.map_err(|e| {
        error!("station listing failed: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(stations))
}

/// Payload of the latest-reading endpoint.
///
/// A station with no recorded data answers 200 with an error message in the
/// body rather than a 404.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LatestResponse {
    Reading(Reading),
    NoData { error: String },
}

async fn latest_reading(
    State(state): State<AppStateArc>,
    Path(station_id): Path<String>,
) -> Result<Json<LatestResponse>, (StatusCode, String)> {
    let latest = state.query.latest_reading(&station_id).await.map_err(|e| {
        error!("latest lookup for {station_id} failed: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let payload = match latest {
        Some(reading) => LatestResponse::Reading(reading),
        None => LatestResponse::NoData {
            error: "No data found for this station".to_string(),
        },
    };
    Ok(Json(payload))
}

async fn sensor_history(
    State(state): State<AppStateArc>,
    Path(sensor_type): Path<String>,
) -> Result<Json<BTreeMap<String, Vec<HistoryEntry>>>, (StatusCode, String)> {
    let history = state.query.sensor_history(&sensor_type).await.map_err(|e| {
        error!("history for {sensor_type} failed: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(history))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/api/health", get(health_check))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
