//! Environment-backed configuration.
//!
//! Every setting has a default suitable for local development; deployments
//! override through environment variables. Backend credentials double as
//! feature switches: a missing key simply leaves that backend out of the
//! chain.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Process configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Comma-separated CORS allowlist.
    pub cors_origins: Vec<String>,

    /// Shared secret for the admin surface.
    pub admin_token: String,

    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    /// SQLite document store path. Default: `./.data/claimcheck.db`.
    pub db_path: PathBuf,

    /// Base URL of the source hub (news/gov/social endpoints).
    pub source_hub_url: String,

    /// Google Fact Check Tools API key.
    pub factcheck_api_key: Option<String>,

    /// Gemini API key (chat + embeddings).
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,

    /// OpenRouter API key (chat + embeddings).
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: Option<String>,

    /// Ollama endpoint. Default: `http://localhost:11434`.
    pub ollama_endpoint: String,
    pub ollama_model: Option<String>,

    /// Skip all remote backends.
    pub force_offline: bool,

    /// Similarity floor for knowledge collections. Default: `0.65`.
    pub min_similarity: f32,

    /// Canon-hit threshold. Default: `0.85`.
    pub canon_similarity: f32,

    /// Chunker window and overlap, in characters. Defaults: `800` / `120`.
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    /// Ingest cooldown. Default: 600 s.
    pub cooldown: Duration,

    /// Request-wide deadline. Defaults: 15 s online, 20 s offline.
    pub request_timeout: Duration,

    /// Per-connector deadline during ingestion. Default: 60 s.
    pub connector_timeout: Duration,

    /// Per-backend deadline for one model call. Default: 30 s.
    pub model_timeout: Duration,

    /// Health sampling interval. Default: 60 s.
    pub health_interval: Duration,

    /// Embedding batch size. Default: 32.
    pub embed_batch: usize,

    /// Evidence items kept for the prompt. Default: 25.
    pub context_limit: usize,

    /// Claim-log queue capacity. Default: 1024.
    pub log_queue_capacity: usize,
}

const DEFAULT_ADMIN_TOKEN: &str = "dev_admin_token_change_in_production";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            cors_origins: DEFAULT_CORS_ORIGINS.split(',').map(String::from).collect(),
            admin_token: DEFAULT_ADMIN_TOKEN.to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            db_path: PathBuf::from("./.data/claimcheck.db"),
            source_hub_url: "http://localhost:8001".to_string(),
            factcheck_api_key: None,
            gemini_api_key: None,
            gemini_model: None,
            openrouter_api_key: None,
            openrouter_model: None,
            ollama_endpoint: "http://localhost:11434".to_string(),
            ollama_model: None,
            force_offline: false,
            min_similarity: 0.65,
            canon_similarity: 0.85,
            chunk_size: 800,
            chunk_overlap: 120,
            cooldown: Duration::from_secs(600),
            request_timeout: Duration::from_secs(15),
            connector_timeout: Duration::from_secs(60),
            model_timeout: Duration::from_secs(30),
            health_interval: Duration::from_secs(60),
            embed_batch: 32,
            context_limit: 25,
            log_queue_capacity: 1024,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "CLAIMCHECK_PORT";
    const ENV_BIND_ADDR: &'static str = "CLAIMCHECK_BIND_ADDR";
    const ENV_CORS_ORIGINS: &'static str = "CORS_ORIGINS";
    const ENV_ADMIN_TOKEN: &'static str = "X_ADMIN_TOKEN";
    const ENV_QDRANT_URL: &'static str = "QDRANT_URL";
    const ENV_DB_PATH: &'static str = "CLAIMCHECK_DB_PATH";
    const ENV_SOURCE_HUB_URL: &'static str = "SOURCE_HUB_URL";
    const ENV_FACTCHECK_API_KEY: &'static str = "FACTCHECK_API_KEY";
    const ENV_GEMINI_API_KEY: &'static str = "GEMINI_API_KEY";
    const ENV_GEMINI_MODEL: &'static str = "GEMINI_MODEL";
    const ENV_OPENROUTER_API_KEY: &'static str = "OPENROUTER_API_KEY";
    const ENV_OPENROUTER_MODEL: &'static str = "OPENROUTER_MODEL";
    const ENV_OLLAMA_ENDPOINT: &'static str = "OLLAMA_ENDPOINT";
    const ENV_OLLAMA_MODEL: &'static str = "OLLAMA_MODEL";
    const ENV_FORCE_OFFLINE: &'static str = "FORCE_OFFLINE_MODE";
    const ENV_MIN_SIMILARITY: &'static str = "MIN_SIMILARITY";
    const ENV_CANON_SIMILARITY: &'static str = "CANON_SIMILARITY";
    const ENV_CHUNK_SIZE: &'static str = "CHUNK_SIZE";
    const ENV_CHUNK_OVERLAP: &'static str = "CHUNK_OVERLAP";
    const ENV_COOLDOWN_SEC: &'static str = "T_COOLDOWN_SEC";
    const ENV_REQUEST_SEC: &'static str = "T_REQUEST_SEC";
    const ENV_CONNECTOR_SEC: &'static str = "T_CONNECTOR_SEC";
    const ENV_MODEL_SEC: &'static str = "T_MODEL_SEC";
    const ENV_HEALTH_SEC: &'static str = "T_HEALTH_SEC";
    const ENV_EMBED_BATCH: &'static str = "EMBED_BATCH";
    const ENV_CONTEXT_LIMIT: &'static str = "CONTEXT_LIMIT";
    const ENV_LOG_QUEUE: &'static str = "LOG_QUEUE_CAPACITY";

    /// Loads configuration from the environment on top of defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let force_offline = flag_from_env(Self::ENV_FORCE_OFFLINE);

        // Offline deployments get a longer request budget: the local model
        // is slower than the remote ones.
        let default_request_secs = if force_offline { 20 } else { 15 };

        let config = Self {
            port: parse_from_env(Self::ENV_PORT, defaults.port)?,
            bind_addr: parse_from_env(Self::ENV_BIND_ADDR, defaults.bind_addr)?,
            cors_origins: string_from_env(Self::ENV_CORS_ORIGINS, DEFAULT_CORS_ORIGINS)
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            admin_token: string_from_env(Self::ENV_ADMIN_TOKEN, DEFAULT_ADMIN_TOKEN),
            qdrant_url: string_from_env(Self::ENV_QDRANT_URL, &defaults.qdrant_url),
            db_path: env::var(Self::ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            source_hub_url: string_from_env(Self::ENV_SOURCE_HUB_URL, &defaults.source_hub_url),
            factcheck_api_key: optional_from_env(Self::ENV_FACTCHECK_API_KEY),
            gemini_api_key: optional_from_env(Self::ENV_GEMINI_API_KEY),
            gemini_model: optional_from_env(Self::ENV_GEMINI_MODEL),
            openrouter_api_key: optional_from_env(Self::ENV_OPENROUTER_API_KEY),
            openrouter_model: optional_from_env(Self::ENV_OPENROUTER_MODEL),
            ollama_endpoint: string_from_env(Self::ENV_OLLAMA_ENDPOINT, &defaults.ollama_endpoint),
            ollama_model: optional_from_env(Self::ENV_OLLAMA_MODEL),
            force_offline,
            min_similarity: parse_from_env(Self::ENV_MIN_SIMILARITY, defaults.min_similarity)?,
            canon_similarity: parse_from_env(Self::ENV_CANON_SIMILARITY, defaults.canon_similarity)?,
            chunk_size: parse_from_env(Self::ENV_CHUNK_SIZE, defaults.chunk_size)?,
            chunk_overlap: parse_from_env(Self::ENV_CHUNK_OVERLAP, defaults.chunk_overlap)?,
            cooldown: secs_from_env(Self::ENV_COOLDOWN_SEC, defaults.cooldown)?,
            request_timeout: secs_from_env(
                Self::ENV_REQUEST_SEC,
                Duration::from_secs(default_request_secs),
            )?,
            connector_timeout: secs_from_env(Self::ENV_CONNECTOR_SEC, defaults.connector_timeout)?,
            model_timeout: secs_from_env(Self::ENV_MODEL_SEC, defaults.model_timeout)?,
            health_interval: secs_from_env(Self::ENV_HEALTH_SEC, defaults.health_interval)?,
            embed_batch: parse_from_env(Self::ENV_EMBED_BATCH, defaults.embed_batch)?,
            context_limit: parse_from_env(Self::ENV_CONTEXT_LIMIT, defaults.context_limit)?,
            log_queue_capacity: parse_from_env(Self::ENV_LOG_QUEUE, defaults.log_queue_capacity)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Basic invariants; does not touch the filesystem or network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapExceedsChunk {
                size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        Ok(())
    }

    /// `"{bind_addr}:{port}"` for binding and logs.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn string_from_env(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn optional_from_env(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag_from_env(var: &str) -> bool {
    matches!(
        env::var(var).unwrap_or_default().trim(),
        "1" | "true" | "yes"
    )
}

fn parse_from_env<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn secs_from_env(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(parse_from_env(
        var,
        default.as_secs(),
    )?))
}
