//! Extraction of analysis payloads from raw model output
//!
//! Model output is free-form text that usually, but not always, contains one
//! JSON object. Extraction runs in three steps:
//! 1. Strip code fences from both ends
//! 2. Isolate the first balanced `{ ... }` span with a scanning state machine
//! 3. Parse, validate the narrative fields, normalize the optional collections
//!
//! Normalization is idempotent: serializing a parsed payload and parsing it
//! again yields the same payload.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    AnalysisPayload, DegradationReason, ExternalResources, GeographicLocation, TimelineEvent,
};

/// Narrative fields every payload must carry, in snake_case
pub const MANDATORY_FIELDS: [&str; 4] = [
    "cultural_origin",
    "cross_cultural_connections",
    "modern_analogy",
    "visualization_description",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// No parseable object in the output
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Object parsed but a narrative field is missing or blank
    #[error("Incomplete payload: missing mandatory field '{key}'")]
    IncompletePayload { key: &'static str },
}

impl ParseError {
    pub fn degradation_reason(&self) -> DegradationReason {
        match self {
            ParseError::MalformedPayload(_) => DegradationReason::MalformedPayload,
            ParseError::IncompletePayload { .. } => DegradationReason::IncompletePayload,
        }
    }
}

/// Parse raw model output into a validated payload
pub fn parse_analysis_payload(raw: &str) -> Result<AnalysisPayload, ParseError> {
    let unfenced = strip_code_fences(raw);
    let span = extract_json_object(unfenced)?;

    let value: Value = serde_json::from_str(span)
        .map_err(|e| ParseError::MalformedPayload(format!("invalid JSON object: {}", e)))?;
    let object = match value {
        Value::Object(map) => snake_case_keys(map),
        _ => {
            return Err(ParseError::MalformedPayload(
                "top-level value is not an object".to_string(),
            ))
        }
    };

    let [origin_key, connections_key, analogy_key, visualization_key] = MANDATORY_FIELDS;

    Ok(AnalysisPayload {
        cultural_origin: required_text(&object, origin_key)?,
        cross_cultural_connections: required_text(&object, connections_key)?,
        modern_analogy: required_text(&object, analogy_key)?,
        visualization_description: required_text(&object, visualization_key)?,
        timeline_events: normalize_timeline(collect_items(
            present(&object, "timeline_events"),
            "timeline_events",
            prepare_timeline_item,
        )),
        geographic_locations: normalize_locations(collect_items(
            present(&object, "geographic_locations"),
            "geographic_locations",
            prepare_location_item,
        )),
        key_concepts: collect_items(present(&object, "key_concepts"), "key_concepts", |v| v),
        external_resources: normalize_resources(present(&object, "external_resources")),
    })
}

/// Remove a leading and a trailing triple-backtick fence
///
/// The leading fence may carry a language tag in any case (`json`, `JSON`).
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(after) = text.strip_prefix("```") {
        let tag_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(after.len());
        text = after[tag_len..].trim_start();
    }

    if let Some(before) = text.strip_suffix("```") {
        text = before.trim_end();
    }

    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Structural JSON text
    Code,
    /// Inside a string literal
    InString,
    /// Just after a backslash inside a string literal
    Escape,
}

/// Isolate the first balanced `{ ... }` span
///
/// Braces inside string literals do not count towards depth.
pub fn extract_json_object(text: &str) -> Result<&str, ParseError> {
    let start = text
        .find('{')
        .ok_or_else(|| ParseError::MalformedPayload("no JSON object found".to_string()))?;

    let mut depth = 0usize;
    let mut state = ScanState::Code;

    for (offset, ch) in text[start..].char_indices() {
        state = match (state, ch) {
            (ScanState::Code, '{') => {
                depth += 1;
                ScanState::Code
            }
            (ScanState::Code, '}') => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Ok(&text[start..end]);
                }
                ScanState::Code
            }
            (ScanState::Code, '"') => ScanState::InString,
            (ScanState::Code, _) => ScanState::Code,
            (ScanState::InString, '\\') => ScanState::Escape,
            (ScanState::InString, '"') => ScanState::Code,
            (ScanState::InString, _) => ScanState::InString,
            (ScanState::Escape, _) => ScanState::InString,
        };
    }

    Err(ParseError::MalformedPayload(format!(
        "unbalanced braces: {} object(s) left open",
        depth
    )))
}

/// `culturalOrigin` → `cultural_origin`; snake_case input is unchanged
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else if ch == '-' || ch == ' ' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rewrite object keys to snake_case
///
/// Keys already in snake_case win over converted spellings of the same name.
fn snake_case_keys(map: Map<String, Value>) -> Map<String, Value> {
    let mut converted = Vec::new();
    let mut out = Map::new();

    for (key, value) in map {
        let snake = to_snake_case(&key);
        if snake == key {
            out.insert(key, value);
        } else {
            converted.push((snake, value));
        }
    }
    for (key, value) in converted {
        out.entry(key).or_insert(value);
    }
    out
}

/// Value for `key` unless absent or JSON `null`
fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

fn required_text(object: &Map<String, Value>, key: &'static str) -> Result<String, ParseError> {
    present(object, key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ParseError::IncompletePayload { key })
}

/// Deserialize array elements one by one, dropping the ones that do not fit
fn collect_items<T, F>(value: Option<&Value>, label: &str, prepare: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: Fn(Value) -> Value,
{
    let items = match value {
        None => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            warn!(collection = label, kind = %json_kind(other), "Collection is not an array, using empty");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| {
            let item = match item.clone() {
                Value::Object(map) => Value::Object(snake_case_keys(map)),
                other => other,
            };
            match serde_json::from_value::<T>(prepare(item)) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!(collection = label, error = %e, "Dropping unusable collection item");
                    None
                }
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Numeric years become strings
fn prepare_timeline_item(mut item: Value) -> Value {
    if let Some(Value::Number(n)) = item.get("year") {
        let year = n.to_string();
        item["year"] = Value::String(year);
    }
    item
}

/// Accepts `latitude`/`longitude` and `lon` spellings for coordinates
fn prepare_location_item(mut item: Value) -> Value {
    if let Some(Value::Object(coords)) = item.get_mut("coordinates") {
        for (from, to) in [("latitude", "lat"), ("longitude", "lng"), ("lon", "lng")] {
            if !coords.contains_key(to) {
                if let Some(v) = coords.remove(from) {
                    coords.insert(to.to_string(), v);
                }
            }
        }
    }
    item
}

/// Chronological order by parsed year; unparsable years keep their order at the end
fn normalize_timeline(mut events: Vec<TimelineEvent>) -> Vec<TimelineEvent> {
    events.retain(|e| !e.year.trim().is_empty() && !e.title.trim().is_empty());
    events.sort_by_key(|e| match year_sort_key(&e.year) {
        Some(year) => (0u8, year),
        None => (1u8, 0),
    });
    events
}

/// Signed sort key for a free-form year label
///
/// Handles plain years, negative years, BC/BCE suffixes, "c." prefixes,
/// ranges (first year wins) and ordinal centuries.
pub fn year_sort_key(label: &str) -> Option<i64> {
    let lower = label.trim().to_lowercase();
    let digits: String = lower
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let number: i64 = digits.parse().ok()?;

    let before_common_era = lower
        .replace('.', "")
        .split(|c: char| !c.is_alphanumeric())
        .map(|token| token.trim_start_matches(|c: char| c.is_ascii_digit()))
        .any(|token| token == "bc" || token == "bce");
    let negative = before_common_era || lower.starts_with('-');

    if lower.contains("century") {
        let hundreds = number.saturating_mul(100);
        return Some(if negative { -hundreds } else { hundreds - 100 });
    }

    Some(if negative { -number } else { number })
}

fn normalize_locations(locations: Vec<GeographicLocation>) -> Vec<GeographicLocation> {
    locations
        .into_iter()
        .filter(|loc| !loc.name.trim().is_empty() && loc.coordinates.is_valid())
        .map(|mut loc| {
            loc.modern_name = loc
                .modern_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            loc
        })
        .collect()
}

/// Keep http(s) URLs, drop duplicates and empty categories
fn normalize_resources(value: Option<&Value>) -> ExternalResources {
    let mut resources = ExternalResources::new();

    let map = match value {
        None => return resources,
        Some(Value::Object(map)) => map,
        Some(other) => {
            warn!(kind = %json_kind(other), "external_resources is not an object, using empty");
            return resources;
        }
    };

    for (category, urls) in map {
        let candidates: Vec<&str> = match urls {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            Value::String(single) => vec![single.as_str()],
            _ => Vec::new(),
        };

        let mut kept: Vec<String> = Vec::new();
        for url in candidates.into_iter().map(str::trim) {
            let is_web = url.starts_with("https://") || url.starts_with("http://");
            if is_web && !kept.iter().any(|k| k == url) {
                kept.push(url.to_string());
            }
        }

        if !kept.is_empty() {
            resources
                .entry(to_snake_case(category))
                .or_default()
                .extend(kept);
        }
    }

    resources
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "cultural_origin": "Edo-period Japan.",
        "cross_cultural_connections": "Echoes of Chinese poetics.",
        "modern_analogy": "Like a tweet with rules.",
        "visualization_description": "A frog by a mossy pond."
    }"#;

    #[test]
    fn test_strip_fences_with_language_tag() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```JSON\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fences_leaves_plain_text() {
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_extract_nested_object() {
        let text = r#"prefix {"a": {"b": {"c": 1}}, "d": 2} suffix {"e": 3}"#;
        assert_eq!(
            extract_json_object(text).unwrap(),
            r#"{"a": {"b": {"c": 1}}, "d": 2}"#
        );
    }

    #[test]
    fn test_extract_ignores_braces_inside_strings() {
        let text = r#"{"a": "curly } brace { inside", "b": "escaped \" quote }"} trailing"#;
        assert_eq!(
            extract_json_object(text).unwrap(),
            r#"{"a": "curly } brace { inside", "b": "escaped \" quote }"}"#
        );
    }

    #[test]
    fn test_extract_handles_multibyte_text() {
        let text = "Résumé: {\"a\": \"東京\"} fin";
        assert_eq!(extract_json_object(text).unwrap(), "{\"a\": \"東京\"}");
    }

    #[test]
    fn test_extract_unbalanced_is_malformed() {
        let err = extract_json_object(r#"{"a": {"b": 1}"#).unwrap_err();
        assert!(matches!(err, ParseError::MalformedPayload(_)));
    }

    #[test]
    fn test_extract_without_object_is_malformed() {
        let err = extract_json_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, ParseError::MalformedPayload(_)));
    }

    #[test]
    fn test_parse_fenced_output_with_commentary() {
        let raw = format!("Here you go:\n```json\n{}\n```\nHope this helps!", MINIMAL);
        let payload = parse_analysis_payload(&raw).unwrap();
        assert_eq!(payload.cultural_origin, "Edo-period Japan.");
        assert_eq!(payload.visualization_description, "A frog by a mossy pond.");
        assert!(payload.timeline_events.is_empty());
        assert!(payload.geographic_locations.is_empty());
        assert!(payload.key_concepts.is_empty());
        assert!(payload.external_resources.is_empty());
    }

    #[test]
    fn test_parse_camel_case_keys() {
        let raw = r#"{
            "culturalOrigin": "A",
            "crossCulturalConnections": "B",
            "modernAnalogy": "C",
            "visualizationDescription": "D",
            "keyConcepts": [{"term": "Wabi-sabi", "definition": "Beauty in imperfection", "modernParallel": "Visible mending"}]
        }"#;
        let payload = parse_analysis_payload(raw).unwrap();
        assert_eq!(payload.cross_cultural_connections, "B");
        assert_eq!(payload.key_concepts.len(), 1);
        assert_eq!(payload.key_concepts[0].modern_parallel, "Visible mending");
        assert_eq!(payload.key_concepts[0].context, "");
    }

    #[test]
    fn test_snake_case_key_wins_over_camel_duplicate() {
        let raw = r#"{
            "cultural_origin": "snake",
            "culturalOrigin": "camel",
            "cross_cultural_connections": "B",
            "modern_analogy": "C",
            "visualization_description": "D"
        }"#;
        assert_eq!(parse_analysis_payload(raw).unwrap().cultural_origin, "snake");
    }

    #[test]
    fn test_missing_mandatory_field_is_incomplete() {
        let raw = r#"{"cultural_origin": "A", "cross_cultural_connections": "B", "modern_analogy": "C"}"#;
        assert_eq!(
            parse_analysis_payload(raw).unwrap_err(),
            ParseError::IncompletePayload {
                key: "visualization_description"
            }
        );
    }

    #[test]
    fn test_blank_mandatory_field_is_incomplete() {
        let raw = r#"{"cultural_origin": "  ", "cross_cultural_connections": "B", "modern_analogy": "C", "visualization_description": "D"}"#;
        assert_eq!(
            parse_analysis_payload(raw).unwrap_err(),
            ParseError::IncompletePayload {
                key: "cultural_origin"
            }
        );
    }

    #[test]
    fn test_truncated_output_is_malformed() {
        let raw = "```json\n{\"cultural_origin\": \"The haiku form emerged";
        let err = parse_analysis_payload(raw).unwrap_err();
        assert_eq!(err.degradation_reason(), DegradationReason::MalformedPayload);
    }

    #[test]
    fn test_invalid_json_inside_balanced_braces_is_malformed() {
        let err = parse_analysis_payload("{cultural_origin: 'single quotes'}").unwrap_err();
        assert!(matches!(err, ParseError::MalformedPayload(_)));
    }

    #[test]
    fn test_null_collections_default_to_empty() {
        let raw = r#"{
            "cultural_origin": "A", "cross_cultural_connections": "B",
            "modern_analogy": "C", "visualization_description": "D",
            "timeline_events": null, "external_resources": null
        }"#;
        let payload = parse_analysis_payload(raw).unwrap();
        assert!(payload.timeline_events.is_empty());
        assert!(payload.external_resources.is_empty());
    }

    #[test]
    fn test_timeline_sorted_chronologically() {
        let raw = r#"{
            "cultural_origin": "A", "cross_cultural_connections": "B",
            "modern_analogy": "C", "visualization_description": "D",
            "timeline_events": [
                {"year": "1686", "title": "Frog poem", "description": "d", "significance": "s"},
                {"year": 1644, "title": "Basho born"},
                {"year": "c. 500 BCE", "title": "Classical era"},
                {"year": "unknown", "title": "Undated"},
                {"year": "8th century", "title": "Man'yoshu"}
            ]
        }"#;
        let payload = parse_analysis_payload(raw).unwrap();
        let titles: Vec<&str> = payload
            .timeline_events
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec!["Classical era", "Man'yoshu", "Basho born", "Frog poem", "Undated"]
        );
        assert_eq!(payload.timeline_events[2].year, "1644");
    }

    #[test]
    fn test_year_sort_key_variants() {
        assert_eq!(year_sort_key("1603"), Some(1603));
        assert_eq!(year_sort_key("-44"), Some(-44));
        assert_eq!(year_sort_key("44 BC"), Some(-44));
        assert_eq!(year_sort_key("c. 2600 B.C.E."), Some(-2600));
        assert_eq!(year_sort_key("500BCE"), Some(-500));
        assert_eq!(year_sort_key("1500-1600"), Some(1500));
        assert_eq!(year_sort_key("AD 79"), Some(79));
        assert_eq!(year_sort_key("5th century BCE"), Some(-500));
        assert_eq!(year_sort_key("12th century"), Some(1100));
        assert_eq!(year_sort_key("antiquity"), None);
    }

    #[test]
    fn test_locations_filtered_and_normalized() {
        let raw = r#"{
            "cultural_origin": "A", "cross_cultural_connections": "B",
            "modern_analogy": "C", "visualization_description": "D",
            "geographic_locations": [
                {"name": "Edo", "coordinates": {"lat": 35.68, "lng": 139.69}, "significance": "Capital", "modernName": "Tokyo"},
                {"name": "Kyoto", "coordinates": {"latitude": 35.01, "longitude": 135.77}},
                {"name": "Nowhere", "coordinates": {"lat": 123.0, "lng": 0.0}},
                {"name": "No coordinates"},
                {"name": "Blank modern name", "coordinates": {"lat": 1.0, "lon": 2.0}, "modern_name": "  "}
            ]
        }"#;
        let payload = parse_analysis_payload(raw).unwrap();
        let names: Vec<&str> = payload
            .geographic_locations
            .iter()
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(names, vec!["Edo", "Kyoto", "Blank modern name"]);
        assert_eq!(payload.geographic_locations[0].modern_name.as_deref(), Some("Tokyo"));
        assert_eq!(payload.geographic_locations[1].coordinates.lng, 135.77);
        assert_eq!(payload.geographic_locations[2].modern_name, None);
        assert_eq!(payload.geographic_locations[2].coordinates.lng, 2.0);
    }

    #[test]
    fn test_non_array_collection_defaults_to_empty() {
        let raw = r#"{
            "cultural_origin": "A", "cross_cultural_connections": "B",
            "modern_analogy": "C", "visualization_description": "D",
            "key_concepts": "none relevant"
        }"#;
        assert!(parse_analysis_payload(raw).unwrap().key_concepts.is_empty());
    }

    #[test]
    fn test_external_resources_normalized() {
        let raw = r#"{
            "cultural_origin": "A", "cross_cultural_connections": "B",
            "modern_analogy": "C", "visualization_description": "D",
            "external_resources": {
                "furtherReading": ["https://www.britannica.com/art/haiku", "https://www.britannica.com/art/haiku", "javascript:alert(1)"],
                "map_links": "https://www.google.com/maps/place/Tokyo",
                "timeline_links": []
            }
        }"#;
        let payload = parse_analysis_payload(raw).unwrap();
        assert_eq!(
            payload.external_resources.get("further_reading"),
            Some(&vec!["https://www.britannica.com/art/haiku".to_string()])
        );
        assert_eq!(payload.external_resources["map_links"].len(), 1);
        assert!(!payload.external_resources.contains_key("timeline_links"));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raw = r#"{
            "culturalOrigin": " A ", "cross_cultural_connections": "B",
            "modern_analogy": "C", "visualization_description": "D",
            "timeline_events": [{"year": 1700, "title": "Later"}, {"year": "1600", "title": "Earlier"}],
            "externalResources": {"furtherReading": ["https://en.wikipedia.org/wiki/Haiku"]}
        }"#;
        let first = parse_analysis_payload(raw).unwrap();
        let reserialized = serde_json::to_string(&first).unwrap();
        let second = parse_analysis_payload(&reserialized).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.cultural_origin, "A");
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("culturalOrigin"), "cultural_origin");
        assert_eq!(to_snake_case("cultural_origin"), "cultural_origin");
        assert_eq!(to_snake_case("further-reading"), "further_reading");
        assert_eq!(to_snake_case("modernName"), "modern_name");
    }
}
