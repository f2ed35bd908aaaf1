//! Generative text backend
//!
//! The orchestrator only needs one call: prompt in, raw text (or an explicit
//! safety block) out. `GeminiClient` implements it against the Google
//! Generative Language REST API.

use async_trait::async_trait;
use cca_common::config::GenerativeSettings;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("cca-analyzer/", env!("CARGO_PKG_VERSION"));

/// Backend client errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Generative backend not configured: {0}")]
    NotConfigured(String),

    #[error("Generative backend unavailable: {0}")]
    Unavailable(String),

    #[error("Generative backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Could not decode generative backend response: {0}")]
    Decode(String),
}

/// Outcome of a completion call that reached the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Raw model text (may be blank)
    Text(String),
    /// Prompt or output was withheld by the backend's safety filters
    SafetyBlocked { reason: String },
}

/// Text-completion backend used on cache misses
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Backend identifier for logs (e.g. "gemini")
    fn backend_id(&self) -> &'static str;

    /// Run one completion. Implementations own their timeouts and rate limits.
    async fn complete(&self, prompt: &str) -> Result<Completion, BackendError>;
}

type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Google Gemini `generateContent` client
pub struct GeminiClient {
    http_client: reqwest::Client,
    rate_limiter: DirectRateLimiter,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(settings: &GenerativeSettings) -> Result<Self, BackendError> {
        let per_minute = NonZeroU32::new(settings.requests_per_minute).ok_or_else(|| {
            BackendError::NotConfigured("requests_per_minute must be positive".to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            settings.base_url.trim_end_matches('/'),
            settings.model
        );

        if settings.api_key.is_none() {
            warn!("No generative API key configured; analyses will be returned degraded");
        }

        Ok(Self {
            http_client,
            rate_limiter: governor::RateLimiter::direct(governor::Quota::per_minute(per_minute)),
            api_key: settings.api_key.clone(),
            endpoint,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    fn backend_id(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, BackendError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            BackendError::NotConfigured(format!(
                "set {} or [generative] api_key",
                cca_common::config::API_KEY_ENV
            ))
        })?;

        self.rate_limiter.until_ready().await;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Calling generative backend");

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let completion = interpret_response(body);
        if let Completion::SafetyBlocked { reason } = &completion {
            info!(model = %self.model, reason = %reason, "Generative backend blocked the request");
        }
        Ok(completion)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Finish reasons that mean the output was withheld rather than produced
const BLOCKING_FINISH_REASONS: [&str; 4] = ["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Map a decoded response onto a completion
///
/// A blocked prompt or a first candidate stopped for safety reasons is a
/// block; anything else yields the concatenated text of the first candidate.
fn interpret_response(response: GenerateContentResponse) -> Completion {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Completion::SafetyBlocked { reason };
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Completion::Text(String::new());
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return Completion::SafetyBlocked {
                reason: reason.to_string(),
            };
        }
    }

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    Completion::Text(text)
}
