//! Cache inspection and maintenance endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::cache_store::{CacheStatistics, NORMALIZATION};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub statistics: CacheStatistics,
    pub ttl_days: i64,
    pub normalization: &'static str,
    pub fingerprint: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    pub max_age_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub entries_deleted: u64,
    pub max_age_days: i64,
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> ApiResult<Json<CacheStatsResponse>> {
    let statistics = state.cache.statistics().await?;
    Ok(Json(CacheStatsResponse {
        statistics,
        ttl_days: state.cache.ttl_days(),
        normalization: NORMALIZATION,
        fingerprint: "sha256(text + U+001F + language)",
    }))
}

/// POST /api/cache/clear?max_age_days=
///
/// Deletes entries older than `max_age_days` (default: the cache TTL).
pub async fn clear_cache(
    State(state): State<AppState>,
    query: Result<Query<ClearQuery>, QueryRejection>,
) -> ApiResult<Json<ClearResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let max_age_days = query.max_age_days.unwrap_or_else(|| state.cache.ttl_days());
    let entries_deleted = state.cache.sweep_expired(max_age_days).await?;
    Ok(Json(ClearResponse {
        entries_deleted,
        max_age_days,
    }))
}
