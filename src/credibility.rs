//! Source credibility classification.
//!
//! A pure function of `(source_name, kind)`. The publisher tables are data,
//! not policy: deployments targeting a different media landscape swap the
//! lists without touching the scoring logic.

use serde::{Deserialize, Serialize};

use crate::connectors::SourceKind;

/// Classification bucket, ordered from most to least trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredibilityLevel {
    High,
    MediumHigh,
    Medium,
    Low,
}

impl CredibilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredibilityLevel::High => "high",
            CredibilityLevel::MediumHigh => "medium-high",
            CredibilityLevel::Medium => "medium",
            CredibilityLevel::Low => "low",
        }
    }
}

/// Result of classifying one source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Credibility {
    pub score: f32,
    pub level: CredibilityLevel,
    pub is_verified_source: bool,
}

impl Credibility {
    fn new(score: f32, level: CredibilityLevel) -> Self {
        Self {
            score,
            level,
            is_verified_source: score >= VERIFIED_SOURCE_FLOOR,
        }
    }
}

/// Sources at or above this score are flagged as verified.
pub const VERIFIED_SOURCE_FLOOR: f32 = 0.85;

/// Government and multilateral publishers.
const GOV_PUBLISHERS: &[&str] = &[
    "pib",
    "press information bureau",
    "india.gov",
    "mygov",
    "eci",
    "election commission",
    "world health organization",
    "who",
    "ministry",
];

/// Established fact-checking organizations.
const FACTCHECK_PUBLISHERS: &[&str] = &[
    "altnews",
    "boomlive",
    "boom",
    "factchecker",
    "thequint",
    "factly",
    "newsmobile",
    "snopes",
    "politifact",
    "reuters fact check",
    "afp fact check",
];

/// Tier-1 news publishers.
const TIER1_NEWS: &[&str] = &[
    "the hindu",
    "times of india",
    "indian express",
    "ndtv",
    "hindustan times",
    "reuters",
    "associated press",
    "bbc",
    "the wire",
    "scroll",
    "theprint",
];

fn matches_any(name: &str, table: &[&str]) -> bool {
    table.iter().any(|entry| name.contains(entry))
}

/// Classifies a source by name and kind. Deterministic: identical inputs
/// always produce identical scores.
pub fn classify(source_name: &str, kind: SourceKind) -> Credibility {
    let name = source_name.to_lowercase();

    if kind == SourceKind::Gov || matches_any(&name, GOV_PUBLISHERS) {
        return Credibility::new(0.95, CredibilityLevel::High);
    }

    if kind == SourceKind::FactCheck || matches_any(&name, FACTCHECK_PUBLISHERS) {
        return Credibility::new(0.90, CredibilityLevel::High);
    }

    if matches_any(&name, TIER1_NEWS) {
        return Credibility::new(0.80, CredibilityLevel::MediumHigh);
    }

    if kind == SourceKind::Social {
        return Credibility::new(0.35, CredibilityLevel::Low);
    }

    Credibility::new(0.60, CredibilityLevel::Medium)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gov_outranks_everything() {
        let c = classify("Press Information Bureau", SourceKind::Gov);
        assert_eq!(c.score, 0.95);
        assert_eq!(c.level, CredibilityLevel::High);
        assert!(c.is_verified_source);
    }

    #[test]
    fn gov_publisher_recognized_under_news_kind() {
        let c = classify("WHO Newsroom", SourceKind::News);
        assert_eq!(c.score, 0.95);
    }

    #[test]
    fn factcheckers_are_verified() {
        let c = classify("AltNews", SourceKind::FactCheck);
        assert_eq!(c.score, 0.90);
        assert!(c.is_verified_source);
    }

    #[test]
    fn tier1_news_is_medium_high_and_not_verified() {
        let c = classify("BBC News", SourceKind::News);
        assert_eq!(c.score, 0.80);
        assert_eq!(c.level, CredibilityLevel::MediumHigh);
        assert!(!c.is_verified_source);
    }

    #[test]
    fn unknown_news_is_medium() {
        let c = classify("Random Blog Daily", SourceKind::News);
        assert_eq!(c.score, 0.60);
        assert_eq!(c.level, CredibilityLevel::Medium);
    }

    #[test]
    fn social_is_low() {
        let c = classify("some_user_handle", SourceKind::Social);
        assert_eq!(c.score, 0.35);
        assert_eq!(c.level, CredibilityLevel::Low);
        assert!(!c.is_verified_source);
    }

    #[test]
    fn classification_is_pure() {
        for _ in 0..3 {
            assert_eq!(
                classify("Reuters", SourceKind::News),
                classify("Reuters", SourceKind::News)
            );
        }
    }

    #[test]
    fn case_insensitive_matching() {
        assert_eq!(
            classify("REUTERS", SourceKind::News).score,
            classify("reuters", SourceKind::News).score
        );
    }
}
