//! Health, banner and debug endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// Payment gateway readiness as reported by the health check
#[derive(Debug, Serialize)]
pub struct MidtransHealth {
    pub configured: bool,
    pub mode: String,
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub midtrans: MidtransHealth,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        environment: state.config.environment.clone(),
        midtrans: MidtransHealth {
            configured: state.config.midtrans.is_configured(),
            mode: state.config.midtrans.mode.as_str().to_string(),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
    })
}

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

/// GET /
pub async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "Waste Classification Backend API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/debug
pub async fn debug_ping() -> Json<DebugResponse> {
    Json(DebugResponse {
        message: "Debug endpoint working",
        timestamp: Utc::now(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/api/health", get(health_check))
        .route("/api/debug", get(debug_ping))
}
