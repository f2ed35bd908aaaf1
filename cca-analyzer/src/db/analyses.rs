//! Analysis record persistence
//!
//! Records are written once and never updated. History is newest first.

use cca_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{AnalysisPayload, AnalysisRecord, AnalysisStatus, DegradationReason};

/// Persist a new analysis record
pub async fn insert_analysis(pool: &SqlitePool, record: &AnalysisRecord) -> Result<()> {
    // Serialize everything before touching the pool
    let id = record.id.to_string();
    let timeline_events = serde_json::to_string(&record.payload.timeline_events)?;
    let geographic_locations = serde_json::to_string(&record.payload.geographic_locations)?;
    let key_concepts = serde_json::to_string(&record.payload.key_concepts)?;
    let external_resources = serde_json::to_string(&record.payload.external_resources)?;
    let detected_entities = serde_json::to_string(&record.detected_entities)?;
    let created_at = time::to_db_string(record.created_at);

    sqlx::query(
        r#"
        INSERT INTO analyses (
            id, input_text, language,
            cultural_origin, cross_cultural_connections, modern_analogy, visualization_description,
            timeline_events, geographic_locations, key_concepts, external_resources,
            detected_entities, status, degradation_reason, cache_hit, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&record.input_text)
    .bind(&record.language)
    .bind(&record.payload.cultural_origin)
    .bind(&record.payload.cross_cultural_connections)
    .bind(&record.payload.modern_analogy)
    .bind(&record.payload.visualization_description)
    .bind(&timeline_events)
    .bind(&geographic_locations)
    .bind(&key_concepts)
    .bind(&external_resources)
    .bind(&detected_entities)
    .bind(record.status.as_str())
    .bind(record.degradation_reason.map(|r| r.as_str()))
    .bind(record.cache_hit)
    .bind(&created_at)
    .execute(pool)
    .await?;

    Ok(())
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, input_text, language,
           cultural_origin, cross_cultural_connections, modern_analogy, visualization_description,
           timeline_events, geographic_locations, key_concepts, external_resources,
           detected_entities, status, degradation_reason, cache_hit, created_at
    FROM analyses
"#;

/// Load one record by id
pub async fn load_analysis(pool: &SqlitePool, id: Uuid) -> Result<Option<AnalysisRecord>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| record_from_row(&row)).transpose()
}

/// One page of history, newest first
pub async fn list_analyses(pool: &SqlitePool, skip: i64, limit: i64) -> Result<Vec<AnalysisRecord>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        SELECT_COLUMNS
    ))
    .bind(limit)
    .bind(skip)
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Delete one record; `false` when nothing matched
pub async fn delete_analysis(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM analyses WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_analyses(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analyses")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_degraded(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analyses WHERE status = 'degraded'")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// (language, count) pairs, most common first
pub async fn language_distribution(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT language, COUNT(*) AS n FROM analyses GROUP BY language ORDER BY n DESC, language",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn json_column<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}

fn record_from_row(row: &SqliteRow) -> Result<AnalysisRecord> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid analysis id '{}': {}", id, e)))?;

    let status: String = row.try_get("status")?;
    let status = AnalysisStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown analysis status '{}'", status)))?;

    let degradation_reason: Option<String> = row.try_get("degradation_reason")?;
    let degradation_reason = degradation_reason.as_deref().and_then(DegradationReason::parse);

    let created_at: String = row.try_get("created_at")?;

    Ok(AnalysisRecord {
        id,
        input_text: row.try_get("input_text")?,
        language: row.try_get("language")?,
        payload: AnalysisPayload {
            cultural_origin: row.try_get("cultural_origin")?,
            cross_cultural_connections: row.try_get("cross_cultural_connections")?,
            modern_analogy: row.try_get("modern_analogy")?,
            visualization_description: row.try_get("visualization_description")?,
            timeline_events: json_column(row, "timeline_events")?,
            geographic_locations: json_column(row, "geographic_locations")?,
            key_concepts: json_column(row, "key_concepts")?,
            external_resources: json_column(row, "external_resources")?,
        },
        detected_entities: json_column(row, "detected_entities")?,
        status,
        degradation_reason,
        cache_hit: row.try_get("cache_hit")?,
        created_at: time::from_db_string(&created_at)?,
    })
}
