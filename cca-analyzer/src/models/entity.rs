//! Detected entity types

use serde::{Deserialize, Serialize};

/// Character range inside the analyzed text
///
/// Offsets count Unicode scalar values, `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Civilization,
    Person,
    Place,
    Tradition,
    Work,
    Event,
    Festival,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Civilization => "civilization",
            EntityType::Person => "person",
            EntityType::Place => "place",
            EntityType::Tradition => "tradition",
            EntityType::Work => "work",
            EntityType::Event => "event",
            EntityType::Festival => "festival",
        }
    }
}

/// Reference data attached to a detected entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentData {
    pub canonical_name: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub era: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntity {
    pub span: TextSpan,
    pub entity_type: EntityType,
    pub enriched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_data: Option<EnrichmentData>,
}

/// Flattened view of a detection for UI highlighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub entity_type: EntityType,
    pub enriched: bool,
}

impl From<&DetectedEntity> for Highlight {
    fn from(entity: &DetectedEntity) -> Self {
        Self {
            start: entity.span.start,
            end: entity.span.end,
            text: entity.span.text.clone(),
            entity_type: entity.entity_type,
            enriched: entity.enriched,
        }
    }
}
