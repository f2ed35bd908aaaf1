//! cca-analyzer library - Cultural Context Analyzer service
//!
//! Explains the cultural and historical context of a text passage using a
//! generative model, caches the generated payloads, detects cultural entities
//! and keeps a history of every analysis.

use axum::http::HeaderValue;
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::{AnalysisOrchestrator, CacheStore, EntityDetector, GenerativeBackend};

/// Request-level limits and options handlers need
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Upper bound on submitted text, in characters
    pub max_text_chars: usize,
    /// `["*"]` allows every origin
    pub allowed_origins: Vec<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            max_text_chars: cca_common::config::DEFAULT_MAX_TEXT_CHARS,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub cache: CacheStore,
    pub detector: Arc<dyn EntityDetector>,
    pub settings: ApiSettings,
}

impl AppState {
    /// Wire the pipeline around a pool and its two collaborators
    pub fn new(
        db: SqlitePool,
        backend: Arc<dyn GenerativeBackend>,
        detector: Arc<dyn EntityDetector>,
        cache_ttl_days: i64,
        settings: ApiSettings,
    ) -> Self {
        let cache = CacheStore::new(db.clone(), cache_ttl_days);
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            cache.clone(),
            db.clone(),
            backend,
            detector.clone(),
        ));

        Self {
            db,
            orchestrator,
            cache,
            detector,
            settings,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let cors = cors_layer(&state.settings.allowed_origins);

    let api = Router::new()
        .route("/api/analyze", post(api::analyze))
        .route("/api/history", get(api::history))
        .route(
            "/api/analysis/:id",
            get(api::get_analysis).delete(api::delete_analysis),
        )
        .route("/api/stats", get(api::stats))
        .route("/api/entities/extract", post(api::extract_entities))
        .route("/api/entities/highlights", get(api::entity_highlights))
        .route("/api/cache/stats", get(api::cache_stats))
        .route("/api/cache/clear", post(api::clear_cache));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
