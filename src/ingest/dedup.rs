//! Duplicate rejection.
//!
//! Two keys per item: a normalized URL key checked against everything ever
//! ingested, and a SHA-256 content key checked within the current run.
//! URL-less items dedupe by content key only.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

/// Query parameters that identify campaigns, not content.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "igshid", "mc_cid", "mc_eid", "ref"];

/// Normalizes a URL into its dedup key: lowercase host, tracking params
/// stripped, fragment removed, scheme dropped. Returns `None` for
/// unparseable URLs (the caller falls back to content-only dedup).
pub fn url_key(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut key = format!("{}{}", host, parsed.path().trim_end_matches('/'));
    if !kept.is_empty() {
        let query: Vec<String> = kept.iter().map(|(k, v)| format!("{k}={v}")).collect();
        key.push('?');
        key.push_str(&query.join("&"));
    }

    Some(key)
}

/// SHA-256 over the whitespace-normalized, lowercased body.
pub fn content_key(body: &str) -> String {
    let normalized = body.trim().to_lowercase().replace(['\n', '\r'], " ");
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{digest:x}")
}

/// Tracks what the current run has already accepted.
#[derive(Default)]
pub struct RunDeduper {
    content_keys: HashSet<String>,
    url_keys: HashSet<String>,
}

impl RunDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an item; returns `false` when this run already accepted
    /// the same URL or the same content. Rejected items leave no trace, so
    /// a later distinct item is judged only against accepted ones.
    pub fn admit(&mut self, url_key: Option<&str>, content_key: &str) -> bool {
        let url_dup = url_key.is_some_and(|uk| self.url_keys.contains(uk));
        if url_dup || self.content_keys.contains(content_key) {
            return false;
        }

        if let Some(uk) = url_key {
            self.url_keys.insert(uk.to_string());
        }
        self.content_keys.insert(content_key.to_string());
        true
    }
}
