//! Analysis endpoints
//!
//! - POST /api/analyze
//! - GET /api/history
//! - GET, DELETE /api/analysis/:id
//! - GET /api/stats

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::db::analyses;
use crate::error::{ApiError, ApiResult};
use crate::models::AnalysisRecord;
use crate::pagination::history_window;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_analyses: i64,
    pub degraded_analyses: i64,
    pub language_distribution: BTreeMap<String, i64>,
}

/// Reject bodies over the configured transport limit
pub(crate) fn check_text_size(text: &str, max_chars: usize) -> ApiResult<()> {
    let length = text.chars().count();
    if length > max_chars {
        return Err(ApiError::BadRequest(format!(
            "Text must be at most {} characters long (got {})",
            max_chars, length
        )));
    }
    Ok(())
}

/// Unknown and unparseable ids are both "not found"
fn parse_analysis_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound(format!("Analysis {} not found", id)))
}

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalysisRecord>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    check_text_size(&request.text, state.settings.max_text_chars)?;

    let record = state
        .orchestrator
        .analyze(&request.text, request.language.as_deref())
        .await?;
    Ok(Json(record))
}

/// GET /api/history?skip=&limit=
pub async fn history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AnalysisRecord>>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let window = history_window(query.skip, query.limit);
    let records = analyses::list_analyses(&state.db, window.skip, window.limit).await?;
    Ok(Json(records))
}

/// GET /api/analysis/:id
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AnalysisRecord>> {
    let analysis_id = parse_analysis_id(&id)?;
    analyses::load_analysis(&state.db, analysis_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", id)))
}

/// DELETE /api/analysis/:id
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let analysis_id = parse_analysis_id(&id)?;
    if !analyses::delete_analysis(&state.db, analysis_id).await? {
        return Err(ApiError::NotFound(format!("Analysis {} not found", id)));
    }

    info!(analysis_id = %analysis_id, "Deleted analysis");
    Ok(Json(json!({
        "message": "Analysis deleted",
        "id": analysis_id,
    })))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let total_analyses = analyses::count_analyses(&state.db).await?;
    let degraded_analyses = analyses::count_degraded(&state.db).await?;
    let language_distribution = analyses::language_distribution(&state.db)
        .await?
        .into_iter()
        .collect();

    Ok(Json(StatsResponse {
        total_analyses,
        degraded_analyses,
        language_distribution,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_text_size_counts_chars() {
        assert!(check_text_size("ééééé", 5).is_ok());
        assert!(matches!(
            check_text_size("ééééé!", 5),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_bad_id_is_not_found() {
        assert!(matches!(
            parse_analysis_id("not-a-uuid"),
            Err(ApiError::NotFound(_))
        ));
        assert!(parse_analysis_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
