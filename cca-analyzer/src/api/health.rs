//! Health check and service banner

use axum::{routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

/// Returns status, module name and version
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "cca-analyzer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /
///
/// Service banner with build identification and the endpoint map.
pub async fn service_banner() -> Json<Value> {
    Json(json!({
        "message": "Cultural Context Analyzer API",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": env!("GIT_HASH"),
        "build_timestamp": env!("BUILD_TIMESTAMP"),
        "build_profile": env!("BUILD_PROFILE"),
        "endpoints": {
            "analyze": "POST /api/analyze",
            "history": "GET /api/history?skip=&limit=",
            "analysis": "GET|DELETE /api/analysis/{id}",
            "stats": "GET /api/stats",
            "entities_extract": "POST /api/entities/extract",
            "entities_highlights": "GET /api/entities/highlights?text=",
            "cache_stats": "GET /api/cache/stats",
            "cache_clear": "POST /api/cache/clear?max_age_days=",
            "health": "GET /health"
        }
    }))
}

/// Build health and banner routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(service_banner))
        .route("/health", get(health_check))
}
