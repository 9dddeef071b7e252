//! Local on-host embeddings via Ollama.
//!
//! Ollama's embeddings endpoint is single-prompt, so a batch is a loop; any
//! mid-batch failure discards the partial output to keep the atomic-batch
//! contract.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{check_batch, normalize_text, EmbeddingError, EmbeddingProvider, ProviderId};

const DEFAULT_MODEL: &str = "nomic-embed-text";

pub struct OllamaEmbedder {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(endpoint: &str, model: Option<String>, timeout: Duration) -> Result<Self, EmbeddingError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Unreachable {
                provider: ProviderId::Ollama,
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/embeddings", endpoint.trim_end_matches('/')),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "model": self.model, "prompt": normalize_text(text) }))
            .send()
            .await
            .map_err(|e| EmbeddingError::Unreachable {
                provider: ProviderId::Ollama,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::UpstreamStatus {
                provider: ProviderId::Ollama,
                status: status.as_u16(),
            });
        }

        let payload: OllamaEmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::MalformedPayload {
                    provider: ProviderId::Ollama,
                    reason: e.to_string(),
                })?;

        Ok(payload.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }

        check_batch(ProviderId::Ollama, texts.len(), &vectors)?;
        Ok(vectors)
    }
}
