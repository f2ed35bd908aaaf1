//! Analysis pipeline
//!
//! `analyze` runs, in order: cache lookup, generation on a miss, cache write
//! for complete payloads, entity detection, record persistence.
//!
//! Generation never fails the request. Backend errors, safety blocks and
//! unusable output become a degraded payload, which is recorded but never
//! cached. Every other step propagates its error as `OrchestrationFailure`.

use sqlx::SqlitePool;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::cache_store::CacheStore;
use super::entity_enricher::EntityDetector;
use super::generative_client::{Completion, GenerativeBackend};
use super::prompt::build_analysis_prompt;
use super::response_parser::parse_analysis_payload;
use crate::db::analyses;
use crate::models::{AnalysisRecord, DegradationReason, PayloadOutcome};

/// Minimum analyzable length, in characters after trimming
pub const MIN_TEXT_CHARS: usize = 10;

/// Language used when the caller supplies none
pub const DEFAULT_LANGUAGE: &str = "en";

/// Pipeline step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    CacheLookup,
    CacheWrite,
    EntityDetection,
    Persistence,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::CacheLookup => "cache_lookup",
            PipelineStage::CacheWrite => "cache_write",
            PipelineStage::EntityDetection => "entity_detection",
            PipelineStage::Persistence => "persistence",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Caller-correctable input problem
    #[error("{0}")]
    Validation(String),

    #[error("Analysis failed during {stage}: {source}")]
    OrchestrationFailure {
        stage: PipelineStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl AnalysisError {
    fn failure(
        stage: PipelineStage,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        AnalysisError::OrchestrationFailure {
            stage,
            source: source.into(),
        }
    }
}

/// Reject text shorter than [`MIN_TEXT_CHARS`] once trimmed
pub fn validate_input_text(text: &str) -> Result<(), AnalysisError> {
    let length = text.trim().chars().count();
    if length < MIN_TEXT_CHARS {
        return Err(AnalysisError::Validation(format!(
            "Text must be at least {} characters long (got {})",
            MIN_TEXT_CHARS, length
        )));
    }
    Ok(())
}

/// Trimmed, lowercased language code; blank or missing means English
pub fn normalize_language(language: Option<&str>) -> String {
    match language.map(str::trim) {
        Some(code) if !code.is_empty() => code.to_lowercase(),
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

pub struct AnalysisOrchestrator {
    cache: CacheStore,
    pool: SqlitePool,
    backend: Arc<dyn GenerativeBackend>,
    detector: Arc<dyn EntityDetector>,
}

impl AnalysisOrchestrator {
    pub fn new(
        cache: CacheStore,
        pool: SqlitePool,
        backend: Arc<dyn GenerativeBackend>,
        detector: Arc<dyn EntityDetector>,
    ) -> Self {
        Self {
            cache,
            pool,
            backend,
            detector,
        }
    }

    /// Analyze one passage and persist the resulting record
    pub async fn analyze(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<AnalysisRecord, AnalysisError> {
        validate_input_text(text)?;
        let language = normalize_language(language);
        let started = Instant::now();

        let cached = self
            .cache
            .lookup(text, &language)
            .await
            .map_err(|e| self.fail(PipelineStage::CacheLookup, e))?;
        let cache_hit = cached.is_some();

        let outcome = match cached {
            Some(payload) => {
                info!(language = %language, "Serving analysis from cache");
                PayloadOutcome::Complete(payload)
            }
            None => {
                let outcome = self.generate(text, &language).await;
                if let PayloadOutcome::Complete(payload) = &outcome {
                    self.cache
                        .store(text, &language, payload)
                        .await
                        .map_err(|e| self.fail(PipelineStage::CacheWrite, e))?;
                }
                outcome
            }
        };

        debug!(detector = self.detector.detector_id(), "Detecting entities");
        let detected_entities = self
            .detector
            .detect(text)
            .await
            .map_err(|e| self.fail(PipelineStage::EntityDetection, e))?;

        let (payload, status, degradation_reason) = outcome.into_parts();
        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            input_text: text.to_string(),
            language,
            payload,
            detected_entities,
            status,
            degradation_reason,
            cache_hit,
            created_at: cca_common::time::now(),
        };

        analyses::insert_analysis(&self.pool, &record)
            .await
            .map_err(|e| self.fail(PipelineStage::Persistence, e))?;

        info!(
            analysis_id = %record.id,
            language = %record.language,
            status = record.status.as_str(),
            cache_hit,
            entities = record.detected_entities.len(),
            detector = self.detector.detector_id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(record)
    }

    /// One backend call; every failure mode maps onto a degradation reason
    async fn generate(&self, text: &str, language: &str) -> PayloadOutcome {
        let prompt = build_analysis_prompt(text, language);
        debug!(backend = self.backend.backend_id(), language, "Cache miss, calling backend");

        let raw = match self.backend.complete(&prompt).await {
            Ok(Completion::Text(raw)) => raw,
            Ok(Completion::SafetyBlocked { reason }) => {
                warn!(backend = self.backend.backend_id(), reason = %reason, "Analysis blocked by safety filter");
                return PayloadOutcome::Degraded(DegradationReason::SafetyBlocked);
            }
            Err(e) => {
                warn!(backend = self.backend.backend_id(), error = %e, "Generative backend failed");
                return PayloadOutcome::Degraded(DegradationReason::BackendUnavailable);
            }
        };

        if raw.trim().is_empty() {
            warn!(backend = self.backend.backend_id(), "Generative backend returned empty text");
            return PayloadOutcome::Degraded(DegradationReason::EmptyResponse);
        }

        match parse_analysis_payload(&raw) {
            Ok(payload) => PayloadOutcome::Complete(payload),
            Err(e) => {
                warn!(error = %e, raw_chars = raw.chars().count(), "Could not parse backend output");
                PayloadOutcome::Degraded(e.degradation_reason())
            }
        }
    }

    fn fail(
        &self,
        stage: PipelineStage,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> AnalysisError {
        let err = AnalysisError::failure(stage, source);
        error!(stage = %stage, error = %err, "Analysis pipeline failed");
        err
    }
}
