use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connectors::SourceKind;
use crate::credibility::CredibilityLevel;
use crate::verdict::Verdict;

/// Metadata carried by every indexed record. Canon records additionally
/// carry their adjudication (`verdict`, `explanation`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMeta {
    pub kind: SourceKind,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub credibility_score: f32,
    pub credibility_level: CredibilityLevel,
    pub is_verified_source: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub provider_tag: String,
}

/// One row in a vector collection.
#[derive(Debug, Clone)]
pub struct KbRecord {
    pub record_id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub meta: RecordMeta,
}

/// One search result.
#[derive(Debug, Clone)]
pub struct Hit {
    pub record_id: String,
    pub similarity: f32,
    pub text: String,
    pub meta: RecordMeta,
}

/// Orders hits by descending similarity; ties prefer the more credible
/// source, then the more recent record, then the lexicographically smaller
/// id so results stay deterministic.
pub fn sort_hits(hits: &mut [Hit]) {
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.meta
                    .credibility_score
                    .partial_cmp(&a.meta.credibility_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b.meta.published_at.cmp(&a.meta.published_at))
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
}

#[cfg(test)]
pub(crate) fn test_meta(kind: SourceKind, source: &str) -> RecordMeta {
    let cred = crate::credibility::classify(source, kind);
    RecordMeta {
        kind,
        source_name: source.to_string(),
        url: Some(format!("https://example.com/{}", source.to_lowercase())),
        title: None,
        published_at: None,
        credibility_score: cred.score,
        credibility_level: cred.level,
        is_verified_source: cred.is_verified_source,
        verdict: None,
        explanation: None,
        provider_tag: "test".to_string(),
    }
}
