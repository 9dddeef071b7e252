//! Source connector clients.
//!
//! Each connector normalizes an upstream provider's responses into
//! [`RawItem`]s. Connectors are stateless between calls and report failures
//! as values; a broken provider never aborts an ingestion run.

pub mod factcheck;
pub mod hub;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use factcheck::{normalize_rating, FactCheckClient, FactCheckRecord};
pub use hub::HubClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upstream evidence category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    News,
    Gov,
    #[serde(rename = "factcheck")]
    FactCheck,
    Social,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::News => "news",
            SourceKind::Gov => "gov",
            SourceKind::FactCheck => "factcheck",
            SourceKind::Social => "social",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized upstream record, the unit of ingestion.
///
/// Invariants: `body` is non-empty after trimming; `url`, when present, is
/// an absolute URL (both enforced by [`RawItem::validate`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub provider_tag: String,
    pub kind: SourceKind,
    pub source_name: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    #[serde(default)]
    pub provider_meta: serde_json::Value,
}

impl RawItem {
    /// Checks the structural invariants; items failing validation are
    /// skipped by the orchestrator and recorded as errors.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.body.trim().is_empty() {
            return Err(ConnectorError::InvalidItem {
                provider: self.provider_tag.clone(),
                reason: "empty body".to_string(),
            });
        }
        if let Some(url) = &self.url {
            let parsed = url::Url::parse(url).map_err(|e| ConnectorError::InvalidItem {
                provider: self.provider_tag.clone(),
                reason: format!("invalid url '{}': {}", url, e),
            })?;
            if !parsed.has_host() {
                return Err(ConnectorError::InvalidItem {
                    provider: self.provider_tag.clone(),
                    reason: format!("url without host: '{}'", url),
                });
            }
        }
        Ok(())
    }
}

/// Options accepted by every connector fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub max_items: usize,
    pub since: Option<DateTime<Utc>>,
    pub query_terms: Option<String>,
}

impl FetchOptions {
    pub fn with_limit(max_items: usize) -> Self {
        Self {
            max_items,
            ..Default::default()
        }
    }

    pub fn query(terms: impl Into<String>, max_items: usize) -> Self {
        Self {
            max_items,
            since: None,
            query_terms: Some(terms.into()),
        }
    }
}

/// Errors surfaced by connector clients.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("provider '{provider}' unreachable: {message}")]
    Unreachable { provider: String, message: String },

    #[error("provider '{provider}' returned status {status}")]
    UpstreamStatus { provider: String, status: u16 },

    #[error("provider '{provider}' returned a malformed payload: {reason}")]
    MalformedPayload { provider: String, reason: String },

    #[error("provider '{provider}' is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },

    #[error("item from '{provider}' rejected: {reason}")]
    InvalidItem { provider: String, reason: String },
}

/// Normalizing client for one upstream provider.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Stable provider identifier used in record ids and run errors.
    fn provider_tag(&self) -> &str;

    /// The evidence category this connector yields.
    fn kind(&self) -> SourceKind;

    /// Fetches and normalizes up to `options.max_items` records.
    async fn fetch(&self, options: &FetchOptions) -> Result<Vec<RawItem>, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(body: &str, url: Option<&str>) -> RawItem {
        RawItem {
            provider_tag: "test".to_string(),
            kind: SourceKind::News,
            source_name: "Test Wire".to_string(),
            url: url.map(String::from),
            title: None,
            body: body.to_string(),
            published_at: None,
            language: Some("en".to_string()),
            provider_meta: serde_json::Value::Null,
        }
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(item("   \n", None).validate().is_err());
        assert!(item("actual text", None).validate().is_ok());
    }

    #[test]
    fn relative_url_is_rejected() {
        assert!(item("text", Some("/relative/path")).validate().is_err());
        assert!(item("text", Some("https://example.com/a")).validate().is_ok());
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SourceKind::FactCheck).unwrap(),
            "\"factcheck\""
        );
        assert_eq!(SourceKind::Gov.as_str(), "gov");
    }
}
