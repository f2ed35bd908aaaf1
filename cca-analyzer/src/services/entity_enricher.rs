//! Entity detection seam
//!
//! The orchestrator calls the detector on every request, cache hit or not.
//! An empty result is a valid answer; only a failing detector is an error.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DetectedEntity, Highlight};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Entity lexicon error: {0}")]
    Lexicon(String),

    #[error("Entity detection unavailable: {0}")]
    Unavailable(String),
}

/// Detects cultural entities in text and attaches enrichment data
#[async_trait]
pub trait EntityDetector: Send + Sync {
    /// Detector identifier for logs
    fn detector_id(&self) -> &'static str;

    /// Detections in text order
    async fn detect(&self, text: &str) -> Result<Vec<DetectedEntity>, DetectorError>;
}

/// Summary counts returned alongside detections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionSummary {
    pub total_detected: usize,
    pub enriched_count: usize,
}

pub fn summarize(entities: &[DetectedEntity]) -> DetectionSummary {
    DetectionSummary {
        total_detected: entities.len(),
        enriched_count: entities.iter().filter(|e| e.enriched).count(),
    }
}

pub fn highlights(entities: &[DetectedEntity]) -> Vec<Highlight> {
    entities.iter().map(Highlight::from).collect()
}
