//! Analysis cache queries
//!
//! One row per fingerprint. Writes are upserts, so concurrent misses on the
//! same text resolve to whichever write lands last.

use cca_common::{time, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Raw cache row; the payload is still JSON text
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CacheRow {
    pub fingerprint: String,
    pub language: String,
    pub payload: String,
    pub created_at: String,
    pub expires_at: String,
}

pub async fn get_entry(pool: &SqlitePool, fingerprint: &str) -> Result<Option<CacheRow>> {
    let row = sqlx::query_as::<_, CacheRow>(
        "SELECT fingerprint, language, payload, created_at, expires_at FROM analysis_cache WHERE fingerprint = ?",
    )
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn upsert_entry(
    pool: &SqlitePool,
    fingerprint: &str,
    language: &str,
    payload: &str,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO analysis_cache (fingerprint, language, payload, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(fingerprint) DO UPDATE SET
            language = excluded.language,
            payload = excluded.payload,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(fingerprint)
    .bind(language)
    .bind(payload)
    .bind(time::to_db_string(created_at))
    .bind(time::to_db_string(expires_at))
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove entries created before `cutoff`; returns how many went
pub async fn delete_created_before(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM analysis_cache WHERE created_at < ?")
        .bind(time::to_db_string(cutoff))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn increment_counter(pool: &SqlitePool, name: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cache_counters (name, value) VALUES (?, 1)
        ON CONFLICT(name) DO UPDATE SET value = value + 1
        "#,
    )
    .bind(name)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn read_counter(pool: &SqlitePool, name: &str) -> Result<i64> {
    let value: Option<i64> = sqlx::query_scalar("SELECT value FROM cache_counters WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(value.unwrap_or(0))
}

/// Total entries and those whose `expires_at` is after `now`, from one snapshot
pub async fn count_total_and_active(pool: &SqlitePool, now: DateTime<Utc>) -> Result<(i64, i64)> {
    let counts: (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(expires_at > ?), 0) FROM analysis_cache",
    )
    .bind(time::to_db_string(now))
    .fetch_one(pool)
    .await?;
    Ok(counts)
}

pub async fn language_distribution(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT language, COUNT(*) AS n FROM analysis_cache GROUP BY language ORDER BY n DESC, language",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// (oldest, newest) `created_at`, both `None` when the cache is empty
pub async fn created_at_bounds(pool: &SqlitePool) -> Result<(Option<String>, Option<String>)> {
    let bounds: (Option<String>, Option<String>) =
        sqlx::query_as("SELECT MIN(created_at), MAX(created_at) FROM analysis_cache")
            .fetch_one(pool)
            .await?;
    Ok(bounds)
}
