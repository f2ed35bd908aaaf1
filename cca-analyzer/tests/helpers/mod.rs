//! Shared fixtures for HTTP integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use cca_analyzer::services::{
    BackendError, Completion, EntityDetector, GenerativeBackend, LexiconDetector,
};
use cca_analyzer::{build_router, ApiSettings, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const COMPLETE_REPLY: &str = r#"Sure! Here is the analysis.
```json
{
  "culturalOrigin": "Seventeenth-century Japan during the Edo period.",
  "crossCulturalConnections": "Haiku shaped the Imagist poets in English.",
  "modernAnalogy": "Like a perfectly framed phone photo of a quiet moment.",
  "visualizationDescription": "An old pond, a leaping frog, muted ink tones.",
  "timelineEvents": [
    {"year": 1686, "title": "Old pond haiku written"},
    {"year": "1644", "title": "Basho born"}
  ],
  "geographicLocations": [
    {"name": "Edo", "coordinates": {"lat": 35.68, "lng": 139.69}, "modernName": "Tokyo"}
  ]
}
```"#;

/// Generative backend that replays scripted replies and counts calls
pub struct ScriptedBackend {
    calls: AtomicUsize,
    replies: Mutex<Vec<Result<String, String>>>,
    fallback: Result<String, String>,
}

impl ScriptedBackend {
    /// Always answers with `reply`
    pub fn replying(reply: &str) -> Arc<Self> {
        Self::scripted(Vec::new(), Ok(reply.to_string()))
    }

    /// Always fails as if the backend were down
    pub fn failing() -> Arc<Self> {
        Self::scripted(Vec::new(), Err("connection refused".to_string()))
    }

    /// Plays `replies` in order, then `fallback` forever
    pub fn scripted(replies: Vec<Result<String, String>>, fallback: Result<String, String>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            replies: Mutex::new(replies.into_iter().rev().collect()),
            fallback,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn backend_id(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<Completion, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop().unwrap_or_else(|| self.fallback.clone());
        match next {
            Ok(text) => Ok(Completion::Text(text)),
            Err(reason) => Err(BackendError::Unavailable(reason)),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub backend: Arc<ScriptedBackend>,
    pub db: SqlitePool,
}

impl TestApp {
    pub async fn new(backend: Arc<ScriptedBackend>) -> Self {
        Self::with_settings(backend, ApiSettings::default()).await
    }

    pub async fn with_settings(backend: Arc<ScriptedBackend>, settings: ApiSettings) -> Self {
        let db = cca_common::db::init_memory_database()
            .await
            .expect("in-memory database");
        let detector: Arc<dyn EntityDetector> = Arc::new(LexiconDetector::builtin());
        let state = AppState::new(db.clone(), backend.clone(), detector, 30, settings);

        Self {
            router: build_router(state),
            backend,
            db,
        }
    }

    pub async fn cache_rows(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM analysis_cache")
            .fetch_one(&self.db)
            .await
            .unwrap()
    }
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read and parse a JSON response body
pub async fn extract_json(body: Body) -> Value {
    use http_body_util::BodyExt;

    let bytes = body.collect().await.expect("Should read body").to_bytes();
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
