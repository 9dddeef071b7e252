use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connectors::SourceKind;
use crate::credibility::{classify, Credibility, CredibilityLevel};
use crate::verdict::Verdict;

/// Which branch of the engine produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ExistingFactCheck,
    Reasoned,
    Refused,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ExistingFactCheck => "existing_fact_check",
            Mode::Reasoned => "reasoned",
            Mode::Refused => "refused",
        }
    }
}

/// One source cited in a verification response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub source: String,
    pub url: String,
    pub snippet: String,
    pub credibility_score: f32,
    pub credibility_level: CredibilityLevel,
    pub is_verified_source: bool,
}

/// The engine's answer to one claim.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub mode: Mode,
    pub verdict: Verdict,
    pub confidence: f32,
    pub contradiction_score: f32,
    pub explanation: String,
    pub raw_answer: String,
    pub sources_used: Vec<SourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Partial failures along the way (collection outages, live-fetch
    /// misses). Recorded in the claim log, not part of the wire response.
    #[serde(skip)]
    pub errors: Vec<String>,
}

/// Failures that must surface to the API instead of degrading.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("all model backends are down: {summary}")]
    AllBackendsDown { summary: String },
}

/// One candidate evidence item before ranking and citation.
#[derive(Debug, Clone)]
pub struct EvidenceItem {
    pub kind: SourceKind,
    pub source: String,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub text: String,
    pub similarity: f32,
    pub credibility: Credibility,
}

impl EvidenceItem {
    pub fn from_live(
        kind: SourceKind,
        source: &str,
        url: Option<String>,
        published_at: Option<DateTime<Utc>>,
        text: String,
        similarity_floor: f32,
    ) -> Self {
        Self {
            kind,
            source: source.to_string(),
            url,
            published_at,
            text,
            // Live items never went through the index; they enter ranking
            // at the floor so strong indexed matches outrank them.
            similarity: similarity_floor,
            credibility: classify(source, kind),
        }
    }

    /// Blended ranking score: credibility-weighted with similarity.
    pub fn rank_score(&self) -> f32 {
        self.credibility.score * 0.6 + self.similarity * 0.4
    }
}

/// Orders candidates by blended score, descending. Stable, so equal scores
/// keep their retrieval order.
pub fn rank_evidence(items: &mut Vec<EvidenceItem>, limit: usize) {
    items.sort_by(|a, b| {
        b.rank_score()
            .partial_cmp(&a.rank_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    items.truncate(limit);
}

/// Deterministic placeholder for citations whose record lost its URL.
/// Visible in responses by design; see the deployment notes.
pub fn placeholder_url(source: &str) -> String {
    let slug: String = source
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    format!("https://reference.{}.com", slug.trim_matches('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(kind: SourceKind, source: &str, similarity: f32) -> EvidenceItem {
        EvidenceItem::from_live(kind, source, None, None, "text".to_string(), similarity)
    }

    #[test]
    fn rank_blends_credibility_and_similarity() {
        // Gov at floor similarity (0.95·0.6 + 0.65·0.4 = 0.83) still beats
        // an unknown blog with a strong match (0.60·0.6 + 0.90·0.4 = 0.72).
        let mut items = vec![
            evidence(SourceKind::News, "Random Blog", 0.90),
            evidence(SourceKind::Gov, "PIB", 0.65),
        ];
        rank_evidence(&mut items, 10);
        assert_eq!(items[0].source, "PIB");
    }

    #[test]
    fn rank_truncates_to_limit() {
        let mut items: Vec<EvidenceItem> = (0..40)
            .map(|i| evidence(SourceKind::News, &format!("s{i}"), 0.7))
            .collect();
        rank_evidence(&mut items, 25);
        assert_eq!(items.len(), 25);
    }

    #[test]
    fn placeholder_url_is_deterministic_and_slugged() {
        assert_eq!(
            placeholder_url("Press Information Bureau"),
            "https://reference.press-information-bureau.com"
        );
        assert_eq!(placeholder_url("BBC"), placeholder_url("BBC"));
    }

    #[test]
    fn mode_serialization() {
        assert_eq!(
            serde_json::to_string(&Mode::ExistingFactCheck).unwrap(),
            "\"existing_fact_check\""
        );
        assert_eq!(Mode::Refused.as_str(), "refused");
    }

    #[test]
    fn source_ref_kind_serializes_as_type() {
        let source = SourceRef {
            kind: SourceKind::FactCheck,
            source: "AltNews".to_string(),
            url: "https://altnews.in/x".to_string(),
            snippet: "snippet".to_string(),
            credibility_score: 0.9,
            credibility_level: CredibilityLevel::High,
            is_verified_source: true,
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "factcheck");
    }
}
