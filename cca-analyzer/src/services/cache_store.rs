//! Fingerprint-keyed cache of generative payloads
//!
//! The fingerprint is SHA-256 over the trimmed text and the language code,
//! so the same passage in two languages gets two entries. Entries expire
//! `ttl_days` after they were written; expired rows stay in the table until
//! a sweep removes them but are never served.
//!
//! Only complete payloads are stored; degraded outcomes never reach `store`.

use cca_common::{time, Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::db::cache_entries;
use crate::models::AnalysisPayload;

/// Separates text from language so ("ab", "c") and ("a", "bc") differ
const FINGERPRINT_SEPARATOR: char = '\u{1f}';

const HITS: &str = "hits";
const MISSES: &str = "misses";

/// Normalization applied to text before fingerprinting
pub const NORMALIZATION: &str = "trim_whitespace";

/// Text as it participates in the fingerprint
pub fn normalize_text(text: &str) -> &str {
    text.trim()
}

/// 64-char lowercase hex fingerprint of (text, language)
pub fn fingerprint(text: &str, language: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hasher.update(FINGERPRINT_SEPARATOR.to_string().as_bytes());
    hasher.update(language.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Snapshot of cache contents and effectiveness
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub total_entries: i64,
    pub active_entries: i64,
    pub expired_entries: i64,
    pub hit_count: i64,
    pub miss_count: i64,
    /// hits / (hits + misses) × 100, two decimals; 0 before any lookup
    pub hit_rate_percent: f64,
    pub language_distribution: BTreeMap<String, i64>,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    ttl_days: i64,
}

impl CacheStore {
    pub fn new(pool: SqlitePool, ttl_days: i64) -> Self {
        Self { pool, ttl_days }
    }

    pub fn ttl_days(&self) -> i64 {
        self.ttl_days
    }

    /// Return the live payload for (text, language), counting a hit or a miss
    ///
    /// Expired and unreadable entries count as misses.
    pub async fn lookup(&self, text: &str, language: &str) -> Result<Option<AnalysisPayload>> {
        let key = fingerprint(text, language);
        let payload = self.live_payload(&key).await?;

        let counter = if payload.is_some() { HITS } else { MISSES };
        cache_entries::increment_counter(&self.pool, counter).await?;
        debug!(fingerprint = %key, hit = payload.is_some(), "Cache lookup");

        Ok(payload)
    }

    async fn live_payload(&self, key: &str) -> Result<Option<AnalysisPayload>> {
        let Some(row) = cache_entries::get_entry(&self.pool, key).await? else {
            return Ok(None);
        };

        let expires_at = match time::from_db_string(&row.expires_at) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "Ignoring cache entry with bad expiry");
                return Ok(None);
            }
        };
        if expires_at <= time::now() {
            return Ok(None);
        }

        match serde_json::from_str::<AnalysisPayload>(&row.payload) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "Ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Write a payload under (text, language); an existing entry is replaced
    pub async fn store(&self, text: &str, language: &str, payload: &AnalysisPayload) -> Result<()> {
        let key = fingerprint(text, language);
        let json = serde_json::to_string(payload)?;
        let created_at = time::now();
        let expires_at = created_at + Duration::days(self.ttl_days);

        cache_entries::upsert_entry(&self.pool, &key, language, &json, created_at, expires_at)
            .await?;
        debug!(fingerprint = %key, language, "Cached analysis payload");
        Ok(())
    }

    /// Delete entries created more than `max_age_days` ago
    pub async fn sweep_expired(&self, max_age_days: i64) -> Result<u64> {
        if max_age_days < 0 {
            return Err(Error::InvalidInput(format!(
                "max_age_days must not be negative (got {})",
                max_age_days
            )));
        }

        let cutoff = time::now() - Duration::days(max_age_days);
        let removed = cache_entries::delete_created_before(&self.pool, cutoff).await?;
        info!(max_age_days, removed, "Swept analysis cache");
        Ok(removed)
    }

    pub async fn statistics(&self) -> Result<CacheStatistics> {
        let now = time::now();
        let (total_entries, active_entries) =
            cache_entries::count_total_and_active(&self.pool, now).await?;
        let hit_count = cache_entries::read_counter(&self.pool, HITS).await?;
        let miss_count = cache_entries::read_counter(&self.pool, MISSES).await?;
        let language_distribution = cache_entries::language_distribution(&self.pool)
            .await?
            .into_iter()
            .collect();
        let (oldest, newest) = cache_entries::created_at_bounds(&self.pool).await?;

        Ok(CacheStatistics {
            total_entries,
            active_entries,
            expired_entries: total_entries - active_entries,
            hit_count,
            miss_count,
            hit_rate_percent: hit_rate_percent(hit_count, miss_count),
            language_distribution,
            oldest_entry: oldest.as_deref().map(time::from_db_string).transpose()?,
            newest_entry: newest.as_deref().map(time::from_db_string).transpose()?,
        })
    }
}

fn hit_rate_percent(hits: i64, misses: i64) -> f64 {
    let lookups = hits + misses;
    if lookups <= 0 {
        return 0.0;
    }
    let rate = hits as f64 / lookups as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use cca_common::db::init_memory_database;

    fn payload(origin: &str) -> AnalysisPayload {
        AnalysisPayload {
            cultural_origin: origin.to_string(),
            cross_cultural_connections: "connections".to_string(),
            modern_analogy: "analogy".to_string(),
            visualization_description: "scene".to_string(),
            timeline_events: Vec::new(),
            geographic_locations: Vec::new(),
            key_concepts: Vec::new(),
            external_resources: Default::default(),
        }
    }

    async fn store() -> CacheStore {
        CacheStore::new(init_memory_database().await.unwrap(), 30)
    }

    /// Move an entry's timestamps `days` into the past
    async fn age_entry(cache: &CacheStore, text: &str, language: &str, days: i64) {
        let created = time::now() - Duration::days(days);
        let expires = created + Duration::days(cache.ttl_days());
        sqlx::query("UPDATE analysis_cache SET created_at = ?, expires_at = ? WHERE fingerprint = ?")
            .bind(time::to_db_string(created))
            .bind(time::to_db_string(expires))
            .bind(fingerprint(text, language))
            .execute(&cache.pool)
            .await
            .unwrap();
    }

    #[test]
    fn test_fingerprint_properties() {
        let fp = fingerprint("The Tale of Genji", "en");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        assert_eq!(fp, fingerprint("  The Tale of Genji\n", "en"));
        assert_ne!(fp, fingerprint("The Tale of Genji", "ja"));
        assert_ne!(fp, fingerprint("the tale of genji", "en"));
        assert_ne!(fingerprint("ab", "c"), fingerprint("a", "bc"));
    }

    #[test]
    fn test_hit_rate_rounding() {
        assert_eq!(hit_rate_percent(0, 0), 0.0);
        assert_eq!(hit_rate_percent(1, 2), 33.33);
        assert_eq!(hit_rate_percent(2, 1), 66.67);
        assert_eq!(hit_rate_percent(5, 0), 100.0);
    }

    #[tokio::test]
    async fn test_store_then_lookup_hits() {
        let cache = store().await;
        assert!(cache.lookup("Kyoto temples", "en").await.unwrap().is_none());

        cache.store("Kyoto temples", "en", &payload("Heian")).await.unwrap();
        let hit = cache.lookup(" Kyoto temples ", "en").await.unwrap();
        assert_eq!(hit, Some(payload("Heian")));

        let stats = cache.statistics().await.unwrap();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_rate_percent, 50.0);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.active_entries, 1);
    }

    #[tokio::test]
    async fn test_language_separates_entries() {
        let cache = store().await;
        cache.store("Hanami", "en", &payload("english")).await.unwrap();
        assert!(cache.lookup("Hanami", "ja").await.unwrap().is_none());
        assert_eq!(
            cache.lookup("Hanami", "en").await.unwrap(),
            Some(payload("english"))
        );
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = store().await;
        cache.store("Obon", "en", &payload("first")).await.unwrap();
        cache.store("Obon", "en", &payload("second")).await.unwrap();
        assert_eq!(cache.lookup("Obon", "en").await.unwrap(), Some(payload("second")));
        assert_eq!(cache.statistics().await.unwrap().total_entries, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = store().await;
        cache.store("Edo period", "en", &payload("edo")).await.unwrap();
        age_entry(&cache, "Edo period", "en", 31).await;

        assert!(cache.lookup("Edo period", "en").await.unwrap().is_none());

        let stats = cache.statistics().await.unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.active_entries, 0);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss_until_overwritten() {
        let cache = store().await;
        cache.store("Stoicism", "en", &payload("stoa")).await.unwrap();
        sqlx::query("UPDATE analysis_cache SET payload = 'not json'")
            .execute(&cache.pool)
            .await
            .unwrap();

        assert!(cache.lookup("Stoicism", "en").await.unwrap().is_none());
        // Lookups never delete; the row stays until a store or a sweep
        assert_eq!(cache.statistics().await.unwrap().total_entries, 1);

        cache.store("Stoicism", "en", &payload("stoa")).await.unwrap();
        assert_eq!(cache.lookup("Stoicism", "en").await.unwrap(), Some(payload("stoa")));
    }

    #[tokio::test]
    async fn test_bad_expiry_is_a_miss_and_kept() {
        let cache = store().await;
        cache.store("Hanami", "en", &payload("blossom")).await.unwrap();
        sqlx::query("UPDATE analysis_cache SET expires_at = 'someday'")
            .execute(&cache.pool)
            .await
            .unwrap();

        assert!(cache.lookup("Hanami", "en").await.unwrap().is_none());
        assert_eq!(cache.statistics().await.unwrap().total_entries, 1);
    }

    #[tokio::test]
    async fn test_statistics_split_active_and_expired() {
        let cache = store().await;
        cache.store("Edo period", "en", &payload("edo")).await.unwrap();
        cache.store("Meiji era", "en", &payload("meiji")).await.unwrap();
        age_entry(&cache, "Edo period", "en", 31).await;

        let stats = cache.statistics().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.active_entries, 1);
        assert_eq!(stats.expired_entries, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_entries() {
        let cache = store().await;
        cache.store("old passage", "en", &payload("old")).await.unwrap();
        cache.store("fresh passage", "en", &payload("fresh")).await.unwrap();
        age_entry(&cache, "old passage", "en", 40).await;

        assert_eq!(cache.sweep_expired(30).await.unwrap(), 1);
        assert_eq!(cache.sweep_expired(30).await.unwrap(), 0);
        assert!(cache.lookup("fresh passage", "en").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_zero_days_clears_everything() {
        let cache = store().await;
        cache.store("one passage", "en", &payload("a")).await.unwrap();
        cache.store("two passage", "fr", &payload("b")).await.unwrap();
        age_entry(&cache, "one passage", "en", 1).await;
        age_entry(&cache, "two passage", "fr", 1).await;

        assert_eq!(cache.sweep_expired(0).await.unwrap(), 2);
        assert_eq!(cache.statistics().await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_sweep_rejects_negative_age() {
        let cache = store().await;
        assert!(matches!(
            cache.sweep_expired(-1).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_statistics_on_empty_cache() {
        let cache = store().await;
        let stats = cache.statistics().await.unwrap();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.hit_rate_percent, 0.0);
        assert!(stats.oldest_entry.is_none());
        assert!(stats.newest_entry.is_none());
        assert!(stats.language_distribution.is_empty());
    }

    #[tokio::test]
    async fn test_statistics_language_distribution() {
        let cache = store().await;
        cache.store("first text", "en", &payload("a")).await.unwrap();
        cache.store("second text", "en", &payload("b")).await.unwrap();
        cache.store("troisième texte", "fr", &payload("c")).await.unwrap();

        let stats = cache.statistics().await.unwrap();
        assert_eq!(stats.language_distribution.get("en"), Some(&2));
        assert_eq!(stats.language_distribution.get("fr"), Some(&1));
        assert!(stats.oldest_entry.unwrap() <= stats.newest_entry.unwrap());
    }
}
