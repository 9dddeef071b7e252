//! Wire payloads for the public API.

use serde::{Deserialize, Serialize};

use claimcheck::store::ClaimLogRow;
use claimcheck::IngestCounts;

/// `POST /verify` request body.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Minimum claim length, in characters.
pub const MIN_CLAIM_CHARS: usize = 10;

/// `POST /admin/ingest` request body.
#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub force: bool,
}

/// `POST /admin/ingest` response body.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    pub ingested: IngestedCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,
    pub errors: Vec<String>,
}

/// Per-kind counts in the shape the console expects.
#[derive(Debug, Serialize)]
pub struct IngestedCounts {
    pub news: i64,
    pub gov: i64,
    pub factchecks: i64,
    pub social: i64,
}

impl From<IngestCounts> for IngestedCounts {
    fn from(c: IngestCounts) -> Self {
        Self {
            news: c.news,
            gov: c.gov,
            factchecks: c.factchecks,
            social: c.social,
        }
    }
}

/// `GET /health` response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ingest: Option<String>,
    pub models: std::collections::HashMap<String, String>,
}

/// `POST /feedback` request body.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub claim_text: String,
    pub verdict_returned: String,
    pub comment: String,
    #[serde(default)]
    pub screenshot_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: String,
    pub message: String,
}

/// `GET /admin/logs` response body.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub status: String,
    pub count: usize,
    pub logs: Vec<ClaimLogRow>,
}

/// `GET /user/history` response body.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub status: String,
    pub user_id: String,
    pub count: usize,
    pub history: Vec<ClaimLogRow>,
}

/// Query string for the paginated log endpoints. Each endpoint supplies
/// its own default.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}
