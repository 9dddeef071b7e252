//! Embedding providers and the fallback chain.
//!
//! The contract: a provider either returns one vector per input text, in
//! input order and of uniform dimension, or it fails the whole batch. The
//! [`FallbackChain`] walks a preference-ordered provider list and never
//! mixes providers within a batch, so every vector destined for one
//! collection is comparable.

mod chain;
mod hashed;
mod ollama;
mod remote;

pub use chain::{EmbeddedBatch, FallbackChain};
pub use hashed::HashedEmbedder;
pub use ollama::OllamaEmbedder;
pub use remote::{GeminiEmbedder, OpenRouterEmbedder};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies which provider produced a vector. Persisted with each
/// collection so queries can detect provider drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    Openrouter,
    Ollama,
    Hashed,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::Openrouter => "openrouter",
            ProviderId::Ollama => "ollama",
            ProviderId::Hashed => "hashed",
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ProviderId::Gemini | ProviderId::Openrouter)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderId::Gemini),
            "openrouter" => Ok(ProviderId::Openrouter),
            "ollama" => Ok(ProviderId::Ollama),
            "hashed" => Ok(ProviderId::Hashed),
            other => Err(EmbeddingError::UnknownProvider {
                name: other.to_string(),
            }),
        }
    }
}

/// Errors from embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("provider '{provider}' unreachable: {message}")]
    Unreachable { provider: ProviderId, message: String },

    #[error("provider '{provider}' returned status {status}")]
    UpstreamStatus { provider: ProviderId, status: u16 },

    #[error("provider '{provider}' returned a malformed payload: {reason}")]
    MalformedPayload { provider: ProviderId, reason: String },

    #[error("provider '{provider}' is not configured")]
    NotConfigured { provider: ProviderId },

    #[error("provider '{provider}' returned {got} vectors for {expected} inputs")]
    CountMismatch {
        provider: ProviderId,
        expected: usize,
        got: usize,
    },

    #[error("provider '{provider}' returned mixed dimensions within one batch")]
    MixedDimensions { provider: ProviderId },

    #[error("cannot embed empty input")]
    EmptyInput,

    #[error("unknown embedding provider '{name}'")]
    UnknownProvider { name: String },

    #[error("all embedding providers failed: {summary}")]
    AllProvidersFailed { summary: String },
}

/// A single embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Embeds a batch: one vector per input, input order preserved, uniform
    /// dimension, or an error with no partial output.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Collapses whitespace the way every provider expects single-line input.
pub(crate) fn normalize_text(text: &str) -> String {
    text.trim().replace(['\n', '\r'], " ")
}

/// Validates the provider contract on a returned batch.
pub(crate) fn check_batch(
    provider: ProviderId,
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            provider,
            expected,
            got: vectors.len(),
        });
    }
    if let Some(first) = vectors.first() {
        if vectors.iter().any(|v| v.len() != first.len()) {
            return Err(EmbeddingError::MixedDimensions { provider });
        }
    }
    Ok(())
}
