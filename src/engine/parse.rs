//! Tolerant parsing of model replies.
//!
//! Models wrap JSON in prose, code fences and trailing commas. The parser
//! peels those layers; anything beyond that is a parse failure the caller
//! answers with one repair round.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in reply")]
    NoJsonObject,

    #[error("reply JSON is invalid: {0}")]
    InvalidJson(String),

    #[error("reply JSON is not an object")]
    NotAnObject,
}

/// The model's structured answer, before post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReply {
    pub verdict: String,
    pub confidence: f64,
    pub contradiction_score: Option<f64>,
    pub explanation: String,
    pub cited_evidence_indices: Vec<usize>,
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").expect("static regex"))
}

/// Extracts the JSON object from a reply that may carry leading/trailing
/// prose and code fences.
fn extract_json(raw: &str) -> Result<String, ParseError> {
    let trimmed = raw.trim();

    // Prefer a fenced block when present.
    let candidate = if let Some(fence_start) = trimmed.find("```") {
        let after = &trimmed[fence_start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        match after.find("```") {
            Some(fence_end) => after[..fence_end].trim(),
            None => after.trim(),
        }
    } else {
        trimmed
    };

    let start = candidate.find('{').ok_or(ParseError::NoJsonObject)?;
    let end = candidate.rfind('}').ok_or(ParseError::NoJsonObject)?;
    if end <= start {
        return Err(ParseError::NoJsonObject);
    }

    Ok(candidate[start..=end].to_string())
}

fn number_field(value: &serde_json::Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a raw model reply into a [`ParsedReply`].
pub fn parse_reply(raw: &str) -> Result<ParsedReply, ParseError> {
    let json = extract_json(raw)?;
    let json = trailing_comma_re().replace_all(&json, "$1");

    let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    let verdict = object
        .get("verdict")
        .and_then(|v| v.as_str())
        .unwrap_or("unverified")
        .to_string();

    let confidence = number_field(&value, "confidence").unwrap_or(0.0);
    let contradiction_score = number_field(&value, "contradiction_score");

    let explanation = object
        .get("explanation")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let cited_evidence_indices = object
        .get("cited_evidence_indices")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| match v {
                    serde_json::Value::Number(n) => n.as_u64().map(|n| n as usize),
                    serde_json::Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ParsedReply {
        verdict,
        confidence,
        contradiction_score,
        explanation,
        cited_evidence_indices,
    })
}

#[cfg(test)]
impl ParsedReply {
    /// Canonical JSON form; re-parsing it reproduces the same reply.
    fn to_canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
