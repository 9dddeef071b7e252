//! Remote embedding providers: Gemini and OpenRouter.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{check_batch, normalize_text, EmbeddingError, EmbeddingProvider, ProviderId};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "text-embedding-004";

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_OPENROUTER_MODEL: &str = "text-embedding-3-small";

fn build_client(provider: ProviderId, timeout: Duration) -> Result<reqwest::Client, EmbeddingError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EmbeddingError::Unreachable {
            provider,
            message: e.to_string(),
        })
}

/// Gemini `batchEmbedContents` client.
pub struct GeminiEmbedder {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    #[serde(default)]
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(api_key: String, model: Option<String>, timeout: Duration) -> Result<Self, EmbeddingError> {
        Ok(Self {
            http: build_client(ProviderId::Gemini, timeout)?,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let model_ref = format!("models/{}", self.model);
        let requests: Vec<_> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": model_ref,
                    "content": { "parts": [{ "text": normalize_text(text) }] },
                })
            })
            .collect();

        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| EmbeddingError::Unreachable {
                provider: ProviderId::Gemini,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::UpstreamStatus {
                provider: ProviderId::Gemini,
                status: status.as_u16(),
            });
        }

        let payload: GeminiBatchResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::MalformedPayload {
                    provider: ProviderId::Gemini,
                    reason: e.to_string(),
                })?;

        let vectors: Vec<Vec<f32>> = payload.embeddings.into_iter().map(|e| e.values).collect();
        check_batch(ProviderId::Gemini, texts.len(), &vectors)?;
        Ok(vectors)
    }
}

/// OpenAI-compatible `/embeddings` client pointed at OpenRouter.
pub struct OpenRouterEmbedder {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    #[serde(default)]
    data: Vec<OpenAiEmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenRouterEmbedder {
    pub fn new(api_key: String, model: Option<String>, timeout: Duration) -> Result<Self, EmbeddingError> {
        Ok(Self {
            http: build_client(ProviderId::Openrouter, timeout)?,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            base_url: OPENROUTER_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenRouterEmbedder {
    fn id(&self) -> ProviderId {
        ProviderId::Openrouter
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let inputs: Vec<String> = texts.iter().map(|t| normalize_text(t)).collect();

        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": inputs }))
            .send()
            .await
            .map_err(|e| EmbeddingError::Unreachable {
                provider: ProviderId::Openrouter,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::UpstreamStatus {
                provider: ProviderId::Openrouter,
                status: status.as_u16(),
            });
        }

        let payload: OpenAiEmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::MalformedPayload {
                    provider: ProviderId::Openrouter,
                    reason: e.to_string(),
                })?;

        // The API is index-keyed rather than order-guaranteed.
        let mut rows = payload.data;
        rows.sort_by_key(|r| r.index);
        let vectors: Vec<Vec<f32>> = rows.into_iter().map(|r| r.embedding).collect();

        check_batch(ProviderId::Openrouter, texts.len(), &vectors)?;
        Ok(vectors)
    }
}
