//! Gemini embedding and generation providers over the REST API.
//!
//! Both providers share a [`GeminiClient`] that holds the HTTP client, API
//! key, base URL and request timeout. Errors are tagged with the provider
//! name, and HTTP 429 or a `RESOURCE_EXHAUSTED` status maps to
//! [`RagError::RateLimited`] so the retry policy can back off harder.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::Embedding;
use crate::embedding::{EmbeddingProvider, TaskType};
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, GenerationResponse, Generator, SafetySetting};

const PROVIDER: &str = "Gemini";

/// The public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared HTTP plumbing for the Gemini providers.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiClient {
    /// Create a client with the given API key and the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the key is empty or the HTTP
    /// client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Create a client reading the key from `GEMINI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the variable is unset or empty.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            RagError::ConfigError(format!("{API_KEY_ENV} environment variable not set"))
        })?;
        Self::new(api_key)
    }

    /// Create a client with an explicit base URL and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the key is empty or the HTTP
    /// client cannot be built.
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, api_key, base_url: base_url.into() })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{method}", self.base_url.trim_end_matches('/'), model_path(model))
    }

    /// POST `body` to `model:method` and decode the JSON response.
    ///
    /// `wrap` builds the error variant for non-rate-limit failures.
    async fn post<B, R>(
        &self,
        model: &str,
        method: &str,
        body: &B,
        wrap: fn(String) -> RagError,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(model, method);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, method, error = %e, "request failed");
                wrap(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body).ok().map(|e| e.error);
            let api_status = detail.as_ref().and_then(|d| d.status.clone()).unwrap_or_default();
            let message = detail.and_then(|d| d.message).unwrap_or(body);

            error!(provider = PROVIDER, method, %status, api_status = %api_status, "API error");
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || api_status == "RESOURCE_EXHAUSTED"
            {
                return Err(RagError::RateLimited {
                    provider: PROVIDER.into(),
                    message: format!("API returned {status}: {message}"),
                });
            }
            return Err(wrap(format!("API returned {status}: {message}")));
        }

        response.json::<R>().await.map_err(|e| {
            error!(provider = PROVIDER, method, error = %e, "failed to parse response");
            wrap(format!("failed to parse response: {e}"))
        })
    }
}

/// Prefix a bare model id with `models/`.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message }
}

fn generation_error(message: String) -> RagError {
    RagError::GenerationError { provider: PROVIDER.into(), message }
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self { role: None, parts: vec![Part { text }] }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

/// `embedContent` answers with `embedding`, `batchEmbedContents` with
/// `embeddings`. Both decode into this one shape.
#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Option<ContentEmbedding>,
    embeddings: Option<Vec<Option<ContentEmbedding>>>,
}

impl EmbedResponse {
    fn into_slots(self) -> Result<Vec<Option<Embedding>>> {
        let slots = match (self.embedding, self.embeddings) {
            (_, Some(many)) => many,
            (Some(one), None) => vec![Some(one)],
            (None, None) => {
                return Err(embedding_error(
                    "response carries neither 'embedding' nor 'embeddings'".into(),
                ));
            }
        };
        Ok(slots
            .into_iter()
            .map(|slot| slot.map(|e| e.values).filter(|v| !v.is_empty()))
            .collect())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: &'a [SafetySetting],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl From<GenerateContentResponse> for GenerationResponse {
    fn from(response: GenerateContentResponse) -> Self {
        let first = response.candidates.into_iter().next();
        let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
        let text: String = first
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let block_reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .or_else(|| finish_reason.filter(|r| r == "SAFETY"));

        GenerationResponse { text, block_reason }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

// ── Providers ──────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by `embedContent` and `batchEmbedContents`.
///
/// # Example
///
/// ```rust,ignore
/// use hukuk_rag::gemini::{GeminiClient, GeminiEmbeddingProvider};
///
/// let client = GeminiClient::from_env()?;
/// let provider = GeminiEmbeddingProvider::new(client, "models/text-embedding-004");
/// ```
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingProvider {
    client: GeminiClient,
    model: String,
}

impl GeminiEmbeddingProvider {
    /// Create a provider for `model`, e.g. `models/text-embedding-004`.
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self { client, model: model_path(&model.into()) }
    }

    fn request<'a>(&self, text: &'a str, task_type: TaskType) -> EmbedContentRequest<'a> {
        EmbedContentRequest { model: self.model.clone(), content: Content::text(text), task_type }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str, task_type: TaskType) -> Result<Embedding> {
        debug!(
            provider = PROVIDER,
            text_len = text.len(),
            task = task_type.as_api_str(),
            "embedding single text"
        );

        let response: EmbedResponse = self
            .client
            .post(&self.model, "embedContent", &self.request(text, task_type), embedding_error)
            .await?;
        response
            .into_slots()?
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| embedding_error("API returned an empty embedding".into()))
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
        task_type: TaskType,
    ) -> Result<Vec<Option<Embedding>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let body = BatchEmbedRequest {
            requests: texts.iter().map(|t| self.request(t, task_type)).collect(),
        };
        let response: EmbedResponse = self
            .client
            .post(&self.model, "batchEmbedContents", &body, embedding_error)
            .await?;
        response.into_slots()
    }
}

/// A [`Generator`] backed by `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
}

impl GeminiGenerator {
    /// Create a generator for `model`, e.g. `gemini-2.0-flash`.
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self { client, model: model_path(&model.into()) }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = request.prompt.len(),
            "generating"
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &request.prompt }],
            }],
            generation_config: GenerationConfig { temperature: request.settings.temperature },
            safety_settings: &request.settings.safety_settings,
        };
        let response: GenerateContentResponse = self
            .client
            .post(&self.model, "generateContent", &body, generation_error)
            .await?;
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationSettings;

    #[test]
    fn model_ids_get_prefixed() {
        assert_eq!(model_path("gemini-2.0-flash"), "models/gemini-2.0-flash");
        assert_eq!(model_path("models/text-embedding-004"), "models/text-embedding-004");
    }

    #[test]
    fn endpoint_joins_base_and_method() {
        let client = GeminiClient::new("key").unwrap();
        assert_eq!(
            client.endpoint("models/text-embedding-004", "embedContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent"
        );
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(GeminiClient::new("  "), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn embed_request_uses_camel_case_task_type() {
        let client = GeminiClient::new("key").unwrap();
        let provider = GeminiEmbeddingProvider::new(client, "text-embedding-004");
        let json = serde_json::to_value(provider.request("Anayasa", TaskType::Query)).unwrap();
        assert_eq!(json["model"], "models/text-embedding-004");
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["content"]["parts"][0]["text"], "Anayasa");
    }

    #[test]
    fn singular_and_plural_embedding_keys_normalize() {
        let single: EmbedResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.1, 0.2]}}"#).unwrap();
        assert_eq!(single.into_slots().unwrap(), vec![Some(vec![0.1, 0.2])]);

        let batch: EmbedResponse = serde_json::from_str(
            r#"{"embeddings": [{"values": [1.0]}, {"values": []}, null]}"#,
        )
        .unwrap();
        assert_eq!(batch.into_slots().unwrap(), vec![Some(vec![1.0]), None, None]);

        let neither: EmbedResponse = serde_json::from_str("{}").unwrap();
        assert!(neither.into_slots().is_err());
    }

    #[test]
    fn generation_body_carries_settings() {
        let settings = GenerationSettings::for_legal_text(0.3);
        let body = GenerateContentRequest {
            contents: vec![Content::text("soru")],
            generation_config: GenerationConfig { temperature: settings.temperature },
            safety_settings: &settings.safety_settings,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(json["safetySettings"][3]["category"], "HARM_CATEGORY_DANGEROUS_CONTENT");
    }

    #[test]
    fn prompt_feedback_block_is_reported() {
        let raw = r#"{"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerationResponse =
            serde_json::from_str::<GenerateContentResponse>(raw).unwrap().into();
        assert!(response.is_blocked());
        assert_eq!(response.block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn safety_finish_reason_counts_as_block() {
        let raw = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GenerationResponse =
            serde_json::from_str::<GenerateContentResponse>(raw).unwrap().into();
        assert!(response.is_blocked());
    }

    #[test]
    fn candidate_parts_are_concatenated() {
        let raw = r#"{"candidates": [{
            "content": {"parts": [{"text": "Ana"}, {"text": "yasa"}]},
            "finishReason": "STOP"
        }]}"#;
        let response: GenerationResponse =
            serde_json::from_str::<GenerateContentResponse>(raw).unwrap().into();
        assert_eq!(response.text, "Anayasa");
        assert_eq!(response.block_reason, None);
    }
}
