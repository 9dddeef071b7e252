//! Google Fact Check Tools client.
//!
//! Fetches `claims:search` results and normalizes them into
//! [`FactCheckRecord`]s: the publisher's free-text rating is mapped onto the
//! three-valued canon taxonomy through an explicit table.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::ConnectorError;
use crate::verdict::Verdict;

const CLAIMS_SEARCH_URL: &str = "https://factchecktools.googleapis.com/v1alpha1/claims:search";

const PROVIDER_TAG: &str = "google_factcheck";

/// A normalized prior adjudication, ready to become a canon record.
#[derive(Debug, Clone)]
pub struct FactCheckRecord {
    pub claim_text: String,
    pub verdict: Verdict,
    pub explanation: String,
    pub publisher: String,
    pub url: String,
    pub language: String,
    pub published_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub provider_tag: String,
}

// Wire shapes for the claims:search response.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    claims: Vec<ApiClaim>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiClaim {
    #[serde(default)]
    text: String,
    #[serde(default)]
    claim_date: Option<DateTime<Utc>>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    claim_review: Vec<ApiReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReview {
    #[serde(default)]
    publisher: ApiPublisher,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    textual_rating: Option<String>,
    #[serde(default)]
    review_rating: Option<ApiRating>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPublisher {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    site: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRating {
    #[serde(default)]
    rating_value: Option<f64>,
    #[serde(default)]
    best_rating: Option<f64>,
}

/// Rating phrases that mean the claim holds.
const TRUE_RATINGS: &[&str] = &["true", "accurate", "correct", "verified", "correct fact"];

/// Rating phrases that mean the claim is false.
const FALSE_RATINGS: &[&str] = &[
    "false",
    "inaccurate",
    "incorrect",
    "fabricated",
    "hoax",
    "false claim",
    "false information",
    "pants on fire",
];

/// Rating phrases for partially-true or decontextualized claims.
const MISLEADING_RATINGS: &[&str] = &[
    "misleading",
    "mixed",
    "partly",
    "partial",
    "half",
    "out of context",
    "lacks context",
    "missing context",
    "unproven",
];

/// Maps a publisher's textual rating (with an optional numeric rating as
/// fallback) onto the canon taxonomy. Unknown ratings default to
/// `Misleading`: an adjudicated-but-unmappable claim should surface as
/// contested rather than silently pass.
pub fn normalize_rating(textual: &str, rating_value: Option<f64>, best_rating: Option<f64>) -> Verdict {
    let rating = textual.to_lowercase();

    // Negative phrases first: "incorrect" contains "correct" and "half true"
    // contains "true", so the true-table must be checked last.
    if FALSE_RATINGS.iter().any(|p| rating.contains(p)) {
        return Verdict::False;
    }
    if MISLEADING_RATINGS.iter().any(|p| rating.contains(p)) {
        return Verdict::Misleading;
    }
    if TRUE_RATINGS.iter().any(|p| rating.contains(p)) {
        return Verdict::True;
    }

    if let (Some(value), Some(best)) = (rating_value, best_rating) {
        if best > 0.0 {
            return if value > best / 2.0 {
                Verdict::True
            } else {
                Verdict::False
            };
        }
    }

    Verdict::Misleading
}

/// Keyword tables for canon tags, checked in order; the first matching
/// category wins.
const TAG_CATEGORIES: &[(&str, &[&str])] = &[
    ("health", &["vaccine", "covid", "flu", "disease", "medicine", "health", "symptom", "treatment", "cancer", "cure"]),
    ("election", &["election", "vote", "voter", "ballot", "candidate", "poll", "voting"]),
    ("disaster", &["earthquake", "flood", "storm", "hurricane", "cyclone", "tsunami", "disaster", "emergency"]),
    ("politics", &["politician", "minister", "parliament", "president", "government", "senator"]),
    ("science", &["study", "research", "scientist", "climate", "physics", "chemistry"]),
    ("technology", &["tech", "ai", "algorithm", "software", "internet"]),
    ("economy", &["economy", "stock", "market", "business", "price", "inflation"]),
];

/// Derives canon tags from the claim text and verdict.
pub fn extract_tags(claim_text: &str, verdict: Verdict) -> Vec<String> {
    let mut tags = vec![verdict.as_str().to_string()];
    let lowered = claim_text.to_lowercase();

    for (category, keywords) in TAG_CATEGORIES {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            tags.push((*category).to_string());
            break;
        }
    }

    tags
}

/// Client for the Fact Check Tools API.
pub struct FactCheckClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl FactCheckClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectorError::NotConfigured {
                provider: PROVIDER_TAG.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_key,
            endpoint: CLAIMS_SEARCH_URL.to_string(),
        })
    }

    /// Overrides the API endpoint. Test hook.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn provider_tag(&self) -> &'static str {
        PROVIDER_TAG
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Searches for adjudications of `query`: the engine's live lookup.
    pub async fn search(
        &self,
        query: &str,
        language: &str,
        max_claims: usize,
    ) -> Result<Vec<FactCheckRecord>, ConnectorError> {
        self.fetch(Some(query), language, max_claims).await
    }

    /// Recent adjudications without a topical query: the ingestion feed.
    pub async fn recent(
        &self,
        language: &str,
        max_claims: usize,
    ) -> Result<Vec<FactCheckRecord>, ConnectorError> {
        self.fetch(None, language, max_claims).await
    }

    async fn fetch(
        &self,
        query: Option<&str>,
        language: &str,
        max_claims: usize,
    ) -> Result<Vec<FactCheckRecord>, ConnectorError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ConnectorError::NotConfigured {
            provider: PROVIDER_TAG.to_string(),
            reason: "FACTCHECK_API_KEY not set".to_string(),
        })?;

        let page_size = max_claims.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("key", api_key.as_str()),
            ("languageCode", language),
            ("pageSize", &page_size),
        ];
        if let Some(q) = query {
            params.push(("query", q));
        } else {
            // Without a query the API needs an age window to return
            // anything useful.
            params.push(("maxAgeDays", "30"));
        }

        let response = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| ConnectorError::Unreachable {
                provider: PROVIDER_TAG.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::UpstreamStatus {
                provider: PROVIDER_TAG.to_string(),
                status: status.as_u16(),
            });
        }

        let payload: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| ConnectorError::MalformedPayload {
                    provider: PROVIDER_TAG.to_string(),
                    reason: e.to_string(),
                })?;

        let mut records: Vec<FactCheckRecord> = payload
            .claims
            .into_iter()
            .filter_map(normalize_claim)
            .collect();
        records.truncate(max_claims.max(1));

        debug!(query, count = records.len(), "fact-check fetch complete");
        Ok(records)
    }
}

fn normalize_claim(claim: ApiClaim) -> Option<FactCheckRecord> {
    let claim_text = claim.text.trim().to_string();
    if claim_text.is_empty() {
        return None;
    }

    let Some(review) = claim.claim_review.into_iter().next() else {
        warn!(claim = %claim_text, "skipping claim without reviews");
        return None;
    };

    let textual = review.textual_rating.unwrap_or_default();
    let (rating_value, best_rating) = review
        .review_rating
        .map(|r| (r.rating_value, r.best_rating))
        .unwrap_or((None, None));
    let verdict = normalize_rating(&textual, rating_value, best_rating);

    let publisher = review
        .publisher
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let url = review
        .url
        .filter(|u| !u.is_empty())
        .or(review.publisher.site)
        .unwrap_or_default();

    let explanation = review
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| textual.clone());

    let tags = extract_tags(&claim_text, verdict);

    Some(FactCheckRecord {
        claim_text,
        verdict,
        explanation,
        publisher,
        url,
        language: claim.language_code.unwrap_or_else(|| "en".to_string()),
        published_at: claim.claim_date,
        tags,
        provider_tag: PROVIDER_TAG.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_table_covers_common_phrases() {
        assert_eq!(normalize_rating("True", None, None), Verdict::True);
        assert_eq!(normalize_rating("Mostly accurate", None, None), Verdict::True);
        assert_eq!(normalize_rating("FALSE", None, None), Verdict::False);
        assert_eq!(normalize_rating("Pants on Fire", None, None), Verdict::False);
        assert_eq!(normalize_rating("Misleading", None, None), Verdict::Misleading);
        assert_eq!(normalize_rating("Out of Context", None, None), Verdict::Misleading);
        assert_eq!(normalize_rating("Half True", None, None), Verdict::Misleading);
    }

    #[test]
    fn negative_phrases_win_over_embedded_positives() {
        assert_eq!(normalize_rating("Incorrect", None, None), Verdict::False);
        assert_eq!(normalize_rating("Half True", None, None), Verdict::Misleading);
    }

    #[test]
    fn numeric_fallback_splits_on_half_of_best() {
        assert_eq!(normalize_rating("", Some(4.0), Some(5.0)), Verdict::True);
        assert_eq!(normalize_rating("", Some(1.0), Some(5.0)), Verdict::False);
    }

    #[test]
    fn unknown_rating_defaults_to_misleading() {
        assert_eq!(normalize_rating("sarcasm", None, None), Verdict::Misleading);
        assert_eq!(normalize_rating("", None, None), Verdict::Misleading);
    }

    #[test]
    fn tags_carry_verdict_and_one_category() {
        let tags = extract_tags("New vaccine causes autism says viral post", Verdict::False);
        assert_eq!(tags, vec!["false".to_string(), "health".to_string()]);

        let tags = extract_tags("Completely uncategorizable statement", Verdict::True);
        assert_eq!(tags, vec!["true".to_string()]);
    }

    #[test]
    fn normalize_claim_skips_reviewless_entries() {
        let claim = ApiClaim {
            text: "Some claim".to_string(),
            claim_date: None,
            language_code: None,
            claim_review: vec![],
        };
        assert!(normalize_claim(claim).is_none());
    }

    #[test]
    fn normalize_claim_prefers_review_url_and_title() {
        let claim: ApiClaim = serde_json::from_value(serde_json::json!({
            "text": "The moon is made of cheese",
            "languageCode": "en",
            "claimReview": [{
                "publisher": {"name": "Snopes", "site": "https://snopes.com"},
                "url": "https://snopes.com/moon-cheese",
                "title": "No, the moon is not cheese",
                "textualRating": "False"
            }]
        }))
        .unwrap();

        let record = normalize_claim(claim).unwrap();
        assert_eq!(record.verdict, Verdict::False);
        assert_eq!(record.publisher, "Snopes");
        assert_eq!(record.url, "https://snopes.com/moon-cheese");
        assert_eq!(record.explanation, "No, the moon is not cheese");
    }
}
