//! Instruction template for the analysis call

/// Source domains the model is asked to draw external links from
pub const REPUTABLE_SOURCES: [&str; 10] = [
    "en.wikipedia.org",
    "www.britannica.com",
    "www.worldhistory.org",
    "www.metmuseum.org",
    "www.britishmuseum.org",
    "whc.unesco.org",
    "www.smithsonianmag.com",
    "www.khanacademy.org",
    "plato.stanford.edu",
    "www.google.com/maps",
];

/// External resource categories the model may fill
pub const RESOURCE_CATEGORIES: [&str; 3] = ["timeline_links", "map_links", "further_reading"];

/// Build the analysis prompt for one passage
///
/// Narrative fields are requested unconditionally; each collection only when
/// the passage substantively supports it.
pub fn build_analysis_prompt(text: &str, language: &str) -> String {
    let sources = REPUTABLE_SOURCES.join(", ");
    let categories = RESOURCE_CATEGORIES.join(", ");

    format!(
        r#"You are a cultural and historical expert. Analyze the passage below and explain its cultural context.

Passage (language code: {language}):
"""
{text}
"""

Respond with a single JSON object using exactly these keys:

{{
  "cultural_origin": "Which culture the passage is primarily related to: time period, region and cultural significance.",
  "cross_cultural_connections": "How this text, concept or element relates to or influenced other cultures, with concrete examples of exchange, similarity or adaptation.",
  "modern_analogy": "A clear, relatable modern-day parallel that helps a contemporary reader understand the concept.",
  "visualization_description": "What an illustration of this context should show: elements, colors, symbols, setting and mood.",
  "timeline_events": [{{"year": "1603", "title": "...", "description": "...", "significance": "..."}}],
  "geographic_locations": [{{"name": "...", "coordinates": {{"lat": 0.0, "lng": 0.0}}, "significance": "...", "modern_name": "..."}}],
  "key_concepts": [{{"term": "...", "definition": "...", "context": "...", "modern_parallel": "..."}}],
  "external_resources": {{"timeline_links": [], "map_links": [], "further_reading": []}}
}}

Rules:
- Always fill cultural_origin, cross_cultural_connections, modern_analogy and visualization_description with substantial, factual content (at least 3-4 sentences each).
- Include timeline_events only when the passage refers to datable history; list them in chronological order. Otherwise omit the key.
- Include geographic_locations only when specific places are relevant; coordinates are decimal degrees. Otherwise omit the key.
- Include key_concepts only for terms a general reader would need explained. Otherwise omit the key.
- Include external_resources only with working URLs from these sources: {sources}. Allowed categories: {categories}. Otherwise omit the key.
- Write the narrative fields in the language identified by the code "{language}".
- Return ONLY the JSON object, with no commentary and no code fences."#
    )
}
