//! wastewise-api library interface
//!
//! Exposes the router and state so integration tests can drive the service
//! without binding a socket.

pub mod api;
pub mod error;
pub mod pagination;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use wastewise_common::config::ServiceConfig;

use crate::services::image_storage::MAX_FILE_SIZE;
use crate::services::{ImageStore, MidtransClient, MlClient};

/// Request body cap: the largest accepted image plus room for multipart
/// framing and form fields, so oversized files reach image validation
pub const BODY_LIMIT_BYTES: usize = MAX_FILE_SIZE + 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved service configuration
    pub config: Arc<ServiceConfig>,
    pub ml_client: MlClient,
    pub midtrans: MidtransClient,
    /// Article cover image directory
    pub images: ImageStore,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build state and outbound clients from configuration
    pub fn new(db: SqlitePool, config: ServiceConfig) -> ApiResult<Self> {
        let ml_client = MlClient::new(&config.ml_service_url)
            .map_err(|e| ApiError::Internal(format!("ML client setup failed: {}", e)))?;
        let midtrans = MidtransClient::new(config.midtrans.clone())
            .map_err(|e| ApiError::Internal(format!("Midtrans client setup failed: {}", e)))?;
        let images = ImageStore::new(config.upload_dir.clone());

        Ok(Self {
            db,
            config: Arc::new(config),
            ml_client,
            midtrans,
            images,
            startup_time: Utc::now(),
        })
    }

    /// Swap the payment client (tests point it at a local fake)
    pub fn with_midtrans(mut self, midtrans: MidtransClient) -> Self {
        self.midtrans = midtrans;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.images.dir());

    Router::new()
        .merge(api::health_routes())
        .merge(api::article_routes())
        .merge(api::admin_article_routes())
        .merge(api::article_image_routes())
        .merge(api::user_routes())
        .merge(api::waste_bank_routes())
        .merge(api::classify_routes())
        .merge(api::payment_routes())
        .nest_service("/uploads/articles", uploads)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
