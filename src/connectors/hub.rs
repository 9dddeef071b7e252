//! Client for the source hub: the aggregation service that fronts the news
//! API, government RSS feeds and the social sampler, exposing them as JSON
//! tool endpoints (`/tools/news.get_latest` and friends).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ConnectorError, FetchOptions, RawItem, SourceConnector, SourceKind};

const NEWS_PATH: &str = "/tools/news.get_latest";
const GOV_PATH: &str = "/tools/gov.get_bulletins";
const SOCIAL_PATH: &str = "/tools/social.get_samples";

/// Wire shape of one hub item. The hub already flattens the upstream
/// providers, so the fields are uniform across categories.
#[derive(Debug, Deserialize)]
struct HubItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "summary", alias = "description")]
    text: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct HubEnvelope {
    #[serde(default)]
    items: Vec<HubItem>,
}

/// One hub category endpoint as a [`SourceConnector`].
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    kind: SourceKind,
    provider_tag: String,
}

impl HubClient {
    pub fn new(base_url: &str, kind: SourceKind, timeout: Duration) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectorError::NotConfigured {
                provider: format!("hub:{kind}"),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            kind,
            provider_tag: format!("hub:{kind}"),
        })
    }

    fn path(&self) -> &'static str {
        match self.kind {
            SourceKind::News => NEWS_PATH,
            SourceKind::Gov => GOV_PATH,
            SourceKind::Social => SOCIAL_PATH,
            // The fact-check provider has its own client; routing it here is
            // a wiring bug, caught in debug builds.
            SourceKind::FactCheck => unreachable!("fact-check fetches go through FactCheckClient"),
        }
    }

    fn default_source(&self) -> &'static str {
        match self.kind {
            SourceKind::News => "Unknown",
            SourceKind::Gov => "Government",
            SourceKind::Social => "Social",
            SourceKind::FactCheck => "FactCheck",
        }
    }

    fn normalize(&self, item: HubItem) -> RawItem {
        let source_name = item
            .source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.default_source().to_string());

        RawItem {
            provider_tag: self.provider_tag.clone(),
            kind: self.kind,
            source_name,
            url: item.url.filter(|u| !u.is_empty()),
            title: item.title.filter(|t| !t.trim().is_empty()),
            body: item.text.trim().to_string(),
            published_at: item.published_at,
            language: item.language,
            provider_meta: item
                .id
                .map(|id| serde_json::json!({ "hub_id": id }))
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

#[async_trait]
impl SourceConnector for HubClient {
    fn provider_tag(&self) -> &str {
        &self.provider_tag
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, options: &FetchOptions) -> Result<Vec<RawItem>, ConnectorError> {
        let url = format!("{}{}", self.base_url, self.path());
        let mut query: Vec<(&str, String)> = vec![("limit", options.max_items.to_string())];
        if let Some(terms) = &options.query_terms {
            query.push(("q", terms.clone()));
        }
        if let Some(since) = &options.since {
            query.push(("since", since.to_rfc3339()));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ConnectorError::Unreachable {
                provider: self.provider_tag.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::UpstreamStatus {
                provider: self.provider_tag.clone(),
                status: status.as_u16(),
            });
        }

        let envelope: HubEnvelope =
            response
                .json()
                .await
                .map_err(|e| ConnectorError::MalformedPayload {
                    provider: self.provider_tag.clone(),
                    reason: e.to_string(),
                })?;

        let mut items: Vec<RawItem> = envelope
            .items
            .into_iter()
            .map(|item| self.normalize(item))
            .filter(|item| item.validate().is_ok())
            .collect();
        items.truncate(options.max_items.max(1));

        debug!(
            provider = %self.provider_tag,
            count = items.len(),
            "hub fetch complete"
        );

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(kind: SourceKind) -> HubClient {
        HubClient::new("http://localhost:8001/", kind, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = client(SourceKind::News);
        assert_eq!(c.base_url, "http://localhost:8001");
    }

    #[test]
    fn normalize_fills_source_defaults() {
        let c = client(SourceKind::Gov);
        let raw = c.normalize(HubItem {
            id: Some("abc".to_string()),
            title: Some("  ".to_string()),
            text: "  Bulletin text.  ".to_string(),
            url: Some(String::new()),
            source: None,
            language: None,
            published_at: None,
        });

        assert_eq!(raw.source_name, "Government");
        assert_eq!(raw.body, "Bulletin text.");
        assert!(raw.url.is_none());
        assert!(raw.title.is_none());
        assert_eq!(raw.provider_meta["hub_id"], "abc");
    }

    #[test]
    fn envelope_parses_aliased_text_fields() {
        let envelope: HubEnvelope = serde_json::from_str(
            r#"{"items":[{"summary":"from summary","source":"PIB"},{"text":"from text"}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.items[0].text, "from summary");
        assert_eq!(envelope.items[1].text, "from text");
    }
}
