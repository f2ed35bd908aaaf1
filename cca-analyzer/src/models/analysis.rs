//! Analysis payload and record types
//!
//! Wire names are snake_case. Payload collections are always present on
//! output; an omitted collection and an empty one are the same state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::entity::DetectedEntity;

/// Category name (e.g. `further_reading`) → URLs
pub type ExternalResources = BTreeMap<String, Vec<String>>;

/// One dated event relevant to the analyzed text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Free-form year label as given by the model ("1603", "c. 500 BCE")
    pub year: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub significance: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicLocation {
    pub name: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub significance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modern_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConcept {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub modern_parallel: String,
}

/// Structured output of one successful generative call
///
/// This is what the cache stores: no identifiers, no timestamps, no entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub cultural_origin: String,
    pub cross_cultural_connections: String,
    pub modern_analogy: String,
    pub visualization_description: String,
    #[serde(default)]
    pub timeline_events: Vec<TimelineEvent>,
    #[serde(default)]
    pub geographic_locations: Vec<GeographicLocation>,
    #[serde(default)]
    pub key_concepts: Vec<KeyConcept>,
    #[serde(default)]
    pub external_resources: ExternalResources,
}

/// Why a payload had to be synthesized instead of generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    /// Backend call failed (network, HTTP error, missing API key, ...)
    BackendUnavailable,
    /// Backend refused the prompt or its own output on safety grounds
    SafetyBlocked,
    /// Backend answered with blank text
    EmptyResponse,
    /// Output contained no parseable object
    MalformedPayload,
    /// Output parsed but lacked a mandatory narrative field
    IncompletePayload,
}

impl DegradationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationReason::BackendUnavailable => "backend_unavailable",
            DegradationReason::SafetyBlocked => "safety_blocked",
            DegradationReason::EmptyResponse => "empty_response",
            DegradationReason::MalformedPayload => "malformed_payload",
            DegradationReason::IncompletePayload => "incomplete_payload",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "backend_unavailable" => Some(DegradationReason::BackendUnavailable),
            "safety_blocked" => Some(DegradationReason::SafetyBlocked),
            "empty_response" => Some(DegradationReason::EmptyResponse),
            "malformed_payload" => Some(DegradationReason::MalformedPayload),
            "incomplete_payload" => Some(DegradationReason::IncompletePayload),
            _ => None,
        }
    }

    /// Lead sentence shown in place of the cultural origin
    fn headline(&self) -> &'static str {
        match self {
            DegradationReason::BackendUnavailable => {
                "The analysis service is temporarily unavailable, so this content could not be analyzed. Please try again in a moment."
            }
            DegradationReason::SafetyBlocked => {
                "This content could not be analyzed because it was held back by the model's safety filters. Try rephrasing the passage."
            }
            DegradationReason::EmptyResponse => {
                "The analysis came back empty, so this content could not be analyzed. Try rephrasing the passage."
            }
            DegradationReason::MalformedPayload | DegradationReason::IncompletePayload => {
                "The analysis could not be read from the model's response, so this content could not be analyzed. Try rephrasing the passage."
            }
        }
    }

    /// Placeholder payload: readable text in every narrative field, empty collections
    pub fn placeholder_payload(&self) -> AnalysisPayload {
        AnalysisPayload {
            cultural_origin: self.headline().to_string(),
            cross_cultural_connections:
                "Cross-cultural connections are unavailable for this passage. Please try again or rephrase the text."
                    .to_string(),
            modern_analogy:
                "A modern analogy could not be generated for this passage. Please try again or rephrase the text."
                    .to_string(),
            visualization_description: "No visualization available.".to_string(),
            timeline_events: Vec::new(),
            geographic_locations: Vec::new(),
            key_concepts: Vec::new(),
            external_resources: ExternalResources::new(),
        }
    }
}

impl std::fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the generative step: either real content or a typed degradation
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadOutcome {
    Complete(AnalysisPayload),
    Degraded(DegradationReason),
}

impl PayloadOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PayloadOutcome::Degraded(_))
    }

    /// Displayable payload plus the status fields recorded alongside it
    pub fn into_parts(self) -> (AnalysisPayload, AnalysisStatus, Option<DegradationReason>) {
        match self {
            PayloadOutcome::Complete(payload) => (payload, AnalysisStatus::Complete, None),
            PayloadOutcome::Degraded(reason) => (
                reason.placeholder_payload(),
                AnalysisStatus::Degraded,
                Some(reason),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Complete,
    Degraded,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Complete => "complete",
            AnalysisStatus::Degraded => "degraded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "complete" => Some(AnalysisStatus::Complete),
            "degraded" => Some(AnalysisStatus::Degraded),
            _ => None,
        }
    }
}

/// Persisted result of analyzing one input text
///
/// Created once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub input_text: String,
    pub language: String,
    #[serde(flatten)]
    pub payload: AnalysisPayload,
    pub detected_entities: Vec<DetectedEntity>,
    pub status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation_reason: Option<DegradationReason>,
    /// Payload was served from the analysis cache
    pub cache_hit: bool,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn is_degraded(&self) -> bool {
        self.status == AnalysisStatus::Degraded
    }
}
