//! SQLite schema for the document store.

/// Applied idempotently at startup.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS verified_claims (
    claim_id TEXT PRIMARY KEY,
    claim_text TEXT NOT NULL,
    normalized_claim_text TEXT NOT NULL,
    verdict TEXT NOT NULL,
    explanation TEXT NOT NULL DEFAULT '',
    source_url TEXT NOT NULL DEFAULT '',
    publisher TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT 'en',
    published_at TEXT,
    tags_json TEXT NOT NULL DEFAULT '[]',
    provider_tag TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_verified_claims_created ON verified_claims(created_at DESC);

CREATE TABLE IF NOT EXISTS news_items (
    item_id TEXT PRIMARY KEY,
    url_key TEXT UNIQUE,
    url TEXT,
    title TEXT,
    source TEXT NOT NULL,
    body TEXT NOT NULL,
    content_key TEXT NOT NULL,
    published_at TEXT,
    language TEXT,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    provider_tag TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_news_items_published ON news_items(published_at DESC);

CREATE TABLE IF NOT EXISTS gov_items (
    item_id TEXT PRIMARY KEY,
    url_key TEXT UNIQUE,
    url TEXT,
    title TEXT,
    source TEXT NOT NULL,
    body TEXT NOT NULL,
    content_key TEXT NOT NULL,
    published_at TEXT,
    language TEXT,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    provider_tag TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS social_items (
    item_id TEXT PRIMARY KEY,
    url_key TEXT UNIQUE,
    url TEXT,
    title TEXT,
    source TEXT NOT NULL,
    body TEXT NOT NULL,
    content_key TEXT NOT NULL,
    published_at TEXT,
    language TEXT,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    provider_tag TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS claim_logs (
    log_id TEXT PRIMARY KEY,
    received_at TEXT NOT NULL,
    client_fingerprint TEXT NOT NULL,
    claim_text TEXT NOT NULL,
    language TEXT NOT NULL DEFAULT 'en',
    category TEXT,
    mode TEXT NOT NULL,
    verdict TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0,
    contradiction_score REAL NOT NULL DEFAULT 0,
    sources_json TEXT NOT NULL DEFAULT '[]',
    model_used TEXT,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    errors_json TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_claim_logs_received ON claim_logs(received_at DESC);
CREATE INDEX IF NOT EXISTS idx_claim_logs_fingerprint ON claim_logs(client_fingerprint, received_at DESC);

CREATE TABLE IF NOT EXISTS ingest_logs (
    run_id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    triggered_by TEXT NOT NULL,
    forced INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    count_news INTEGER NOT NULL DEFAULT 0,
    count_gov INTEGER NOT NULL DEFAULT 0,
    count_factchecks INTEGER NOT NULL DEFAULT 0,
    count_social INTEGER NOT NULL DEFAULT 0,
    errors_json TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_ingest_logs_started ON ingest_logs(started_at DESC);

-- The singleton gate: at most one run may sit in 'running' at any instant.
-- Starting a run is a conditional insert against this index.
CREATE UNIQUE INDEX IF NOT EXISTS idx_ingest_logs_running_gate
    ON ingest_logs(status) WHERE status = 'running';

CREATE TABLE IF NOT EXISTS feedback (
    feedback_id TEXT PRIMARY KEY,
    received_at TEXT NOT NULL,
    claim_text TEXT NOT NULL,
    verdict_returned TEXT NOT NULL,
    comment TEXT NOT NULL,
    screenshot_url TEXT
);

-- Which embedding provider produced each vector collection, and at what
-- dimension. Pinned at first write.
CREATE TABLE IF NOT EXISTS collection_manifests (
    collection TEXT PRIMARY KEY,
    provider TEXT NOT NULL,
    dim INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
"#;
