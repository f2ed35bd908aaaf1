//! Data models for the analyzer
//!
//! - Analysis payloads produced by the generative backend (and cached)
//! - Persisted analysis records
//! - Detected cultural entities

pub mod analysis;
pub mod entity;

pub use analysis::{
    AnalysisPayload, AnalysisRecord, AnalysisStatus, Coordinates, DegradationReason,
    ExternalResources, GeographicLocation, KeyConcept, PayloadOutcome, TimelineEvent,
};
pub use entity::{DetectedEntity, EnrichmentData, EntityType, Highlight, TextSpan};
