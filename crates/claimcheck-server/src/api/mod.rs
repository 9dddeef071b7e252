//! HTTP surface (Axum) over the verification engine and the ingestion
//! orchestrator.

pub mod error;
pub mod ratelimit;
pub mod state;
pub mod types;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

pub use error::ApiError;
pub use state::AppState;

use claimcheck::engine::{EngineError, Mode, VerifyResult};
use claimcheck::hashing::client_fingerprint;
use claimcheck::store::{ClaimLogRow, FeedbackRow, RunStatus};
use claimcheck::Verdict;

use types::{
    FeedbackRequest, FeedbackResponse, HealthResponse, HistoryResponse, IngestRequest,
    IngestResponse, LimitQuery, LogsResponse, VerifyRequest, MIN_CLAIM_CHARS,
};

/// Builds the application router.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/verify", post(verify_handler))
        .route("/admin/ingest", post(ingest_handler))
        .route("/admin/logs", get(logs_handler))
        .route("/health", get(health_handler))
        .route("/feedback", post(feedback_handler))
        .route("/user/history", get(history_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Caller identity: an authenticated user id when the console supplies
/// one, otherwise the forwarded peer address. Either way only a hash
/// leaves this function.
fn fingerprint_from(headers: &HeaderMap) -> String {
    let identity = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
        })
        .unwrap_or("unknown");

    client_fingerprint(identity.trim())
}

fn require_admin(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let supplied = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if supplied != state.admin_token {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

async fn verify_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, ApiError> {
    let text = request.text.trim().to_string();
    if text.chars().count() < MIN_CLAIM_CHARS {
        return Err(ApiError::InputInvalid(format!(
            "claim text must be at least {MIN_CLAIM_CHARS} characters"
        )));
    }

    let fingerprint = fingerprint_from(&headers);
    if !state.rate_limiter.check(&fingerprint) {
        return Err(ApiError::RateLimited);
    }

    info!(fingerprint = %fingerprint, language = %request.language, "verify request");
    let started = Instant::now();

    let outcome = tokio::time::timeout(
        state.request_timeout,
        state
            .engine
            .verify(&text, &request.language, request.category.as_deref()),
    )
    .await;

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(EngineError::AllBackendsDown { summary })) => {
            warn!(summary = %summary, "verify failed: model chain exhausted");
            let refused = refused_result("All model backends are currently unavailable.");
            enqueue_claim_log(&state, &fingerprint, &request, &text, &refused, started);
            return Err(ApiError::AllBackendsDown(summary));
        }
        Err(_) => {
            // Deadline fired: the engine future is dropped and every
            // in-flight subordinate call is cancelled with it.
            warn!("verify request deadline exceeded");
            let refused =
                refused_result("The request deadline was exceeded before verification completed.");
            enqueue_claim_log(&state, &fingerprint, &request, &text, &refused, started);
            return Ok(Json(refused).into_response());
        }
    };

    enqueue_claim_log(&state, &fingerprint, &request, &text, &result, started);
    Ok(Json(result).into_response())
}

fn refused_result(reason: &str) -> VerifyResult {
    VerifyResult {
        mode: Mode::Refused,
        verdict: Verdict::Unverified,
        confidence: 0.0,
        contradiction_score: 0.0,
        explanation: reason.to_string(),
        raw_answer: String::new(),
        sources_used: Vec::new(),
        model_used: None,
        timestamp: Utc::now(),
        errors: Vec::new(),
    }
}

/// Claim logs are deferred: the queue write never blocks the response.
fn enqueue_claim_log(
    state: &AppState,
    fingerprint: &str,
    request: &VerifyRequest,
    text: &str,
    result: &VerifyResult,
    started: Instant,
) {
    let row = ClaimLogRow {
        log_id: Uuid::new_v4().to_string(),
        received_at: Utc::now().to_rfc3339(),
        client_fingerprint: fingerprint.to_string(),
        claim_text: text.to_string(),
        language: request.language.clone(),
        category: request.category.clone(),
        mode: result.mode.as_str().to_string(),
        verdict: result.verdict.as_str().to_string(),
        confidence: result.confidence as f64,
        contradiction_score: result.contradiction_score as f64,
        sources_json: serde_json::to_string(&result.sources_used)
            .unwrap_or_else(|_| "[]".to_string()),
        model_used: result.model_used.clone(),
        latency_ms: started.elapsed().as_millis() as i64,
        errors_json: serde_json::to_string(&result.errors).unwrap_or_else(|_| "[]".to_string()),
    };
    state.log_queue.push(row);
}

async fn ingest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<IngestResponse>, ApiError> {
    // Auth before body parsing: a tokenless request is 401 even when it
    // carries no body at all.
    require_admin(&headers, &state)?;

    let request: IngestRequest = if body.trim().is_empty() {
        IngestRequest::default()
    } else {
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InputInvalid(format!("invalid ingest request: {e}")))?
    };
    let force = request.force;
    let report = state
        .orchestrator
        .ingest(force, "admin")
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;

    Ok(Json(IngestResponse {
        status: report.status.as_str().to_string(),
        ingested: report.counts.into(),
        last_synced: report.last_synced,
        errors: report.errors,
    }))
}

async fn logs_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    require_admin(&headers, &state)?;

    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let logs = state
        .store
        .recent_claim_logs(limit)
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;

    Ok(Json(LogsResponse {
        status: "ok".to_string(),
        count: logs.len(),
        logs,
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_ids = state.backend_ids();
    let models = state.health.snapshot(&backend_ids);
    let mode = state.gateway.current_mode().to_string();

    let last_run = state.store.latest_ingest_run().await.ok().flatten();
    let last_failed = matches!(
        last_run.as_ref().and_then(|r| r.status().ok()),
        Some(RunStatus::Failed)
    );
    let last_ingest = last_run.and_then(|r| r.finished_at.clone().or(Some(r.started_at)));

    let status = if state.health.any_down(&backend_ids) || last_failed {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        mode,
        last_ingest,
        models,
    })
}

async fn feedback_handler(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    if request.comment.trim().is_empty() {
        return Err(ApiError::InputInvalid("comment must not be empty".to_string()));
    }

    let row = FeedbackRow {
        feedback_id: Uuid::new_v4().to_string(),
        received_at: Utc::now().to_rfc3339(),
        claim_text: request.claim_text,
        verdict_returned: request.verdict_returned,
        comment: request.comment,
        screenshot_url: request.screenshot_url,
    };

    state
        .store
        .insert_feedback(&row)
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;

    Ok(Json(FeedbackResponse {
        status: "ok".to_string(),
        message: "Feedback received. Thank you!".to_string(),
    }))
}

async fn history_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let fingerprint = fingerprint_from(&headers);
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let history = state
        .store
        .claim_logs_for_fingerprint(&fingerprint, limit)
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;

    Ok(Json(HistoryResponse {
        status: "ok".to_string(),
        user_id: fingerprint,
        count: history.len(),
        history,
    }))
}
