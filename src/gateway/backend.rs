//! Chat completion backends.
//!
//! Three wire dialects behind one trait: Gemini's `generateContent`, the
//! OpenAI-compatible `chat/completions` used by OpenRouter, and Ollama's
//! `generate`. Pings hit each service's cheap listing endpoint rather than
//! spending generation quota.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::error::BackendError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-oss-20b:free";

pub const DEFAULT_OLLAMA_MODEL: &str = "mistral";

const TEMPERATURE: f64 = 0.2;
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// One chat-completion backend in the gateway's chain.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Stable identifier used in health maps and `model_used`.
    fn id(&self) -> &str;

    /// Remote backends are skipped in forced-offline mode.
    fn is_remote(&self) -> bool;

    /// One completion attempt. The gateway owns deadlines and retries.
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, BackendError>;

    /// Cheap liveness probe for the health sampler.
    async fn ping(&self) -> Result<(), BackendError>;
}

fn http_client(connect_timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| BackendError::Network(e.to_string()))
}

fn map_send_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Network(e.to_string())
    }
}

// ===== Gemini =====

pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(Duration::from_secs(10))?,
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
impl ChatBackend for GeminiBackend {
    fn id(&self) -> &str {
        "gemini"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, BackendError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let payload: GeminiResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        let text: String = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::EmptyCompletion);
        }
        Ok(text)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let url = format!("{}/models?key={}&pageSize=1", self.base_url, self.api_key);
        let response = self.http.get(&url).send().await.map_err(map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(())
    }
}

// ===== OpenRouter (OpenAI-compatible) =====

pub struct OpenRouterBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl OpenRouterBackend {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(Duration::from_secs(10))?,
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
impl ChatBackend for OpenRouterBackend {
    fn id(&self) -> &str {
        "openrouter"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, BackendError> {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": TEMPERATURE,
                "max_tokens": MAX_OUTPUT_TOKENS,
            }))
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        let text = payload
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::EmptyCompletion);
        }
        Ok(text)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(())
    }
}

// ===== Ollama =====

pub struct OllamaBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

impl OllamaBackend {
    pub fn new(endpoint: &str, model: Option<String>) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(Duration::from_secs(10))?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn id(&self) -> &str {
        "ollama"
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, BackendError> {
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": TEMPERATURE, "num_predict": MAX_OUTPUT_TOKENS },
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }

        let response = self
            .http
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let payload: OllamaResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        if payload.response.trim().is_empty() {
            return Err(BackendError::EmptyCompletion);
        }
        Ok(payload.response)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(())
    }
}
