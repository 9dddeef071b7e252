//! Durable document storage (SQLite).
//!
//! Collections: `verified_claims` (the canon), per-kind raw item tables,
//! `claim_logs`, `ingest_logs`, `feedback`, plus the per-collection
//! embedding manifests. Logs are append-only; items and canon rows are
//! upserted by id. The `ingest_logs` table doubles as the run singleton
//! gate through a partial unique index on `status = 'running'`.

mod schema;

pub mod error;


pub use error::StoreError;
pub use schema::SCHEMA_SQL;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::connectors::SourceKind;
use crate::embedding::ProviderId;
use crate::verdict::Verdict;

/// Lifecycle of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Ok,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Ok => "ok",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "ok" => Ok(RunStatus::Ok),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            other => Err(StoreError::Decode {
                reason: format!("unknown run status '{other}'"),
            }),
        }
    }
}

/// One canon row: a previously adjudicated claim.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VerifiedClaimRow {
    pub claim_id: String,
    pub claim_text: String,
    pub normalized_claim_text: String,
    pub verdict: String,
    pub explanation: String,
    pub source_url: String,
    pub publisher: String,
    pub language: String,
    pub published_at: Option<String>,
    pub tags_json: String,
    pub provider_tag: String,
    pub created_at: String,
}

impl VerifiedClaimRow {
    pub fn verdict(&self) -> Verdict {
        Verdict::coerce(&self.verdict)
    }

    pub fn tags(&self) -> Vec<String> {
        serde_json::from_str(&self.tags_json).unwrap_or_default()
    }
}

/// One raw ingested item, stored in its kind's table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ItemRow {
    pub item_id: String,
    pub url_key: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub source: String,
    pub body: String,
    pub content_key: String,
    pub published_at: Option<String>,
    pub language: Option<String>,
    pub chunk_count: i64,
    pub provider_tag: String,
    pub created_at: String,
}

/// One `/verify` request outcome.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClaimLogRow {
    pub log_id: String,
    pub received_at: String,
    pub client_fingerprint: String,
    pub claim_text: String,
    pub language: String,
    pub category: Option<String>,
    pub mode: String,
    pub verdict: String,
    pub confidence: f64,
    pub contradiction_score: f64,
    pub sources_json: String,
    pub model_used: Option<String>,
    pub latency_ms: i64,
    pub errors_json: String,
}

/// One ingestion run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IngestRunRow {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub triggered_by: String,
    pub forced: i64,
    pub status: String,
    pub count_news: i64,
    pub count_gov: i64,
    pub count_factchecks: i64,
    pub count_social: i64,
    pub errors_json: String,
}

impl IngestRunRow {
    pub fn status(&self) -> Result<RunStatus, StoreError> {
        self.status.parse()
    }

    pub fn errors(&self) -> Vec<String> {
        serde_json::from_str(&self.errors_json).unwrap_or_default()
    }
}

/// Per-run item counts by kind.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IngestCounts {
    pub news: i64,
    pub gov: i64,
    pub factchecks: i64,
    pub social: i64,
}

/// One piece of user feedback.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FeedbackRow {
    pub feedback_id: String,
    pub received_at: String,
    pub claim_text: String,
    pub verdict_returned: String,
    pub comment: String,
    pub screenshot_url: Option<String>,
}

/// Embedding provenance of one vector collection.
#[derive(Debug, Clone, FromRow)]
pub struct ManifestRow {
    pub collection: String,
    pub provider: String,
    pub dim: i64,
    pub created_at: String,
}

impl ManifestRow {
    pub fn provider_id(&self) -> Result<ProviderId, StoreError> {
        self.provider.parse().map_err(|_| StoreError::Decode {
            reason: format!("unknown embedding provider '{}'", self.provider),
        })
    }
}

fn item_table(kind: SourceKind) -> Result<&'static str, StoreError> {
    match kind {
        SourceKind::News => Ok("news_items"),
        SourceKind::Gov => Ok("gov_items"),
        SourceKind::Social => Ok("social_items"),
        SourceKind::FactCheck => Err(StoreError::UnknownItemKind {
            kind: "factcheck".to_string(),
        }),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

/// Handle over the SQLite pool. Cheap to clone; constructed once at startup
/// and passed explicitly to the components that persist.
#[derive(Clone)]
pub struct DocStore {
    pool: SqlitePool,
}

impl DocStore {
    /// Opens (or creates) the store at `path` and applies the schema.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!(path = %path.display(), "connecting to document store");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-process store for tests. Single connection: an in-memory SQLite
    /// database is private to its connection.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        info!("applying document store schema");
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    // ===== canon =====

    /// Inserts or replaces a canon row by `claim_id`.
    pub async fn upsert_verified_claim(&self, row: &VerifiedClaimRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO verified_claims
                (claim_id, claim_text, normalized_claim_text, verdict, explanation,
                 source_url, publisher, language, published_at, tags_json, provider_tag, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(claim_id) DO UPDATE SET
                claim_text = excluded.claim_text,
                normalized_claim_text = excluded.normalized_claim_text,
                verdict = excluded.verdict,
                explanation = excluded.explanation,
                source_url = excluded.source_url,
                publisher = excluded.publisher,
                language = excluded.language,
                published_at = excluded.published_at,
                tags_json = excluded.tags_json,
                provider_tag = excluded.provider_tag
            "#,
        )
        .bind(&row.claim_id)
        .bind(&row.claim_text)
        .bind(&row.normalized_claim_text)
        .bind(&row.verdict)
        .bind(&row.explanation)
        .bind(&row.source_url)
        .bind(&row.publisher)
        .bind(&row.language)
        .bind(&row.published_at)
        .bind(&row.tags_json)
        .bind(&row.provider_tag)
        .bind(&row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_verified_claims(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM verified_claims")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ===== raw items =====

    /// True when an item with this `url_key` was already ingested.
    pub async fn item_url_exists(&self, kind: SourceKind, url_key: &str) -> Result<bool, StoreError> {
        let table = item_table(kind)?;
        let sql = format!("SELECT 1 FROM {table} WHERE url_key = ? LIMIT 1");
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(url_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Inserts a raw item row; replaces on conflicting id or url_key.
    pub async fn insert_item(&self, kind: SourceKind, row: &ItemRow) -> Result<(), StoreError> {
        let table = item_table(kind)?;
        let sql = format!(
            r#"
            INSERT OR REPLACE INTO {table}
                (item_id, url_key, url, title, source, body, content_key,
                 published_at, language, chunk_count, provider_tag, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        );
        sqlx::query(&sql)
            .bind(&row.item_id)
            .bind(&row.url_key)
            .bind(&row.url)
            .bind(&row.title)
            .bind(&row.source)
            .bind(&row.body)
            .bind(&row.content_key)
            .bind(&row.published_at)
            .bind(&row.language)
            .bind(row.chunk_count)
            .bind(&row.provider_tag)
            .bind(&row.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_items(&self, kind: SourceKind) -> Result<i64, StoreError> {
        let table = item_table(kind)?;
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    // ===== ingest runs =====

    /// Claims the singleton gate and records the run as running. Fails with
    /// [`StoreError::RunAlreadyActive`] when another run holds the gate.
    pub async fn begin_ingest_run(
        &self,
        triggered_by: &str,
        forced: bool,
    ) -> Result<IngestRunRow, StoreError> {
        let row = IngestRunRow {
            run_id: Uuid::new_v4().to_string(),
            started_at: now_rfc3339(),
            finished_at: None,
            triggered_by: triggered_by.to_string(),
            forced: forced as i64,
            status: RunStatus::Running.to_string(),
            count_news: 0,
            count_gov: 0,
            count_factchecks: 0,
            count_social: 0,
            errors_json: "[]".to_string(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO ingest_logs
                (run_id, started_at, finished_at, triggered_by, forced, status,
                 count_news, count_gov, count_factchecks, count_social, errors_json)
            VALUES (?, ?, NULL, ?, ?, 'running', 0, 0, 0, 0, '[]')
            "#,
        )
        .bind(&row.run_id)
        .bind(&row.started_at)
        .bind(&row.triggered_by)
        .bind(row.forced)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(row),
            Err(e) if is_unique_violation(&e) => Err(StoreError::RunAlreadyActive),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the run's terminal state. Exactly one update per run.
    pub async fn finish_ingest_run(
        &self,
        run_id: &str,
        status: RunStatus,
        counts: IngestCounts,
        errors: &[String],
    ) -> Result<(), StoreError> {
        let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            r#"
            UPDATE ingest_logs
            SET finished_at = ?, status = ?, count_news = ?, count_gov = ?,
                count_factchecks = ?, count_social = ?, errors_json = ?
            WHERE run_id = ?
            "#,
        )
        .bind(now_rfc3339())
        .bind(status.to_string())
        .bind(counts.news)
        .bind(counts.gov)
        .bind(counts.factchecks)
        .bind(counts.social)
        .bind(errors_json)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The run currently holding the singleton gate, if any.
    pub async fn active_ingest_run(&self) -> Result<Option<IngestRunRow>, StoreError> {
        let row = sqlx::query_as::<_, IngestRunRow>(
            "SELECT * FROM ingest_logs WHERE status = 'running' LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Marks any run still 'running' as failed. Called once at startup: a
    /// run left behind by a crashed process would hold the gate forever.
    pub async fn fail_stale_running_runs(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE ingest_logs
            SET status = 'failed', finished_at = ?,
                errors_json = '["process terminated mid-run"]'
            WHERE status = 'running'
            "#,
        )
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Most recent run, regardless of outcome.
    pub async fn latest_ingest_run(&self) -> Result<Option<IngestRunRow>, StoreError> {
        let row = sqlx::query_as::<_, IngestRunRow>(
            "SELECT * FROM ingest_logs ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// When the last non-failed run finished, for the cooldown check.
    pub async fn last_successful_ingest_finished_at(
        &self,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT finished_at FROM ingest_logs
            WHERE status IN ('ok', 'partial') AND finished_at IS NOT NULL
            ORDER BY finished_at DESC LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(ts,)| DateTime::parse_from_rfc3339(&ts).ok().map(|dt| dt.with_timezone(&Utc))))
    }

    // ===== claim logs =====

    pub async fn insert_claim_log(&self, row: &ClaimLogRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO claim_logs
                (log_id, received_at, client_fingerprint, claim_text, language, category,
                 mode, verdict, confidence, contradiction_score, sources_json,
                 model_used, latency_ms, errors_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.log_id)
        .bind(&row.received_at)
        .bind(&row.client_fingerprint)
        .bind(&row.claim_text)
        .bind(&row.language)
        .bind(&row.category)
        .bind(&row.mode)
        .bind(&row.verdict)
        .bind(row.confidence)
        .bind(row.contradiction_score)
        .bind(&row.sources_json)
        .bind(&row.model_used)
        .bind(row.latency_ms)
        .bind(&row.errors_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_claim_logs(&self, limit: i64) -> Result<Vec<ClaimLogRow>, StoreError> {
        let rows = sqlx::query_as::<_, ClaimLogRow>(
            "SELECT * FROM claim_logs ORDER BY received_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Claim logs scoped to one caller's fingerprint, newest first.
    pub async fn claim_logs_for_fingerprint(
        &self,
        fingerprint: &str,
        limit: i64,
    ) -> Result<Vec<ClaimLogRow>, StoreError> {
        let rows = sqlx::query_as::<_, ClaimLogRow>(
            r#"
            SELECT * FROM claim_logs
            WHERE client_fingerprint = ?
            ORDER BY received_at DESC LIMIT ?
            "#,
        )
        .bind(fingerprint)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ===== feedback =====

    pub async fn insert_feedback(&self, row: &FeedbackRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO feedback
                (feedback_id, received_at, claim_text, verdict_returned, comment, screenshot_url)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.feedback_id)
        .bind(&row.received_at)
        .bind(&row.claim_text)
        .bind(&row.verdict_returned)
        .bind(&row.comment)
        .bind(&row.screenshot_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== collection manifests =====

    pub async fn collection_manifest(
        &self,
        collection: &str,
    ) -> Result<Option<ManifestRow>, StoreError> {
        let row = sqlx::query_as::<_, ManifestRow>(
            "SELECT * FROM collection_manifests WHERE collection = ?",
        )
        .bind(collection)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Pins `(provider, dim)` for a collection. First writer wins; the
    /// stored manifest is returned so callers converge on one provider.
    pub async fn pin_collection_manifest(
        &self,
        collection: &str,
        provider: ProviderId,
        dim: usize,
    ) -> Result<ManifestRow, StoreError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO collection_manifests (collection, provider, dim, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(provider.as_str())
        .bind(dim as i64)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;

        self.collection_manifest(collection)
            .await?
            .ok_or_else(|| StoreError::Decode {
                reason: format!("manifest for '{collection}' vanished after pin"),
            })
    }
}
