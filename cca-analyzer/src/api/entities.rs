//! Entity detection endpoints
//!
//! Detection here is standalone: nothing is persisted or cached.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};

use super::analysis::check_text_size;
use crate::error::{ApiError, ApiResult};
use crate::models::{DetectedEntity, Highlight};
use crate::services::entity_enricher::{highlights, summarize};
use crate::services::orchestrator::validate_input_text;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct HighlightsQuery {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub entities: Vec<DetectedEntity>,
    pub total_detected: usize,
    pub enriched_count: usize,
}

#[derive(Debug, Serialize)]
pub struct HighlightsResponse {
    pub highlights: Vec<Highlight>,
    pub count: usize,
}

async fn detect(state: &AppState, text: &str) -> ApiResult<Vec<DetectedEntity>> {
    validate_input_text(text)?;
    check_text_size(text, state.settings.max_text_chars)?;
    Ok(state.detector.detect(text).await?)
}

/// POST /api/entities/extract
pub async fn extract_entities(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> ApiResult<Json<ExtractResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let entities = detect(&state, &request.text).await?;
    let summary = summarize(&entities);

    Ok(Json(ExtractResponse {
        entities,
        total_detected: summary.total_detected,
        enriched_count: summary.enriched_count,
    }))
}

/// GET /api/entities/highlights?text=
pub async fn entity_highlights(
    State(state): State<AppState>,
    query: Result<Query<HighlightsQuery>, QueryRejection>,
) -> ApiResult<Json<HighlightsResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let text = query
        .text
        .ok_or_else(|| ApiError::BadRequest("Missing query parameter 'text'".to_string()))?;
    let entities = detect(&state, &text).await?;
    let highlights = highlights(&entities);

    Ok(Json(HighlightsResponse {
        count: highlights.len(),
        highlights,
    }))
}
