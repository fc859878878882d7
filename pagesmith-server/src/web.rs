//! Inbound HTTP surface.
//!
//!   POST /api/index, POST /   task webhook
//!   GET  /health              liveness
//!
//! The webhook checks the shared secret and the request shape, answers
//! immediately, and hands the round to the supervisor. The response never
//! says anything about how the round went.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tower_http::trace::TraceLayer;

use crate::model::{Round, Task, TaskRequest, is_valid_repo_name};
use crate::orchestrator::RoundOrchestrator;
use crate::supervisor::Supervisor;

pub struct AppState {
    secret_digest: [u8; 32],
    orchestrator: Arc<RoundOrchestrator>,
    supervisor: Supervisor,
}

impl AppState {
    pub fn new(shared_secret: &str, orchestrator: Arc<RoundOrchestrator>, supervisor: Supervisor) -> Self {
        Self {
            secret_digest: Sha256::digest(shared_secret.as_bytes()).into(),
            orchestrator,
            supervisor,
        }
    }

    /// Compare digests so timing does not depend on where the secrets differ.
    fn secret_matches(&self, candidate: &str) -> bool {
        let digest: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        digest
            .iter()
            .zip(self.secret_digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

/// Requests rejected before any orchestration starts.
#[derive(Debug)]
pub enum ApiError {
    MethodNotAllowed,
    Unauthorized,
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Only POST requests are allowed".to_string(),
            ),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid secret".to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(MessageBody { message })).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let webhook = post(handle_task).fallback(method_not_allowed);
    Router::new()
        .route("/", webhook.clone())
        .route("/api/index", webhook)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn handle_task(
    State(state): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    // credential first, nothing else in the body is looked at until it passes
    if !state.secret_matches(secret_field(&body)) {
        tracing::warn!(task = ?body.get("task"), "Rejected task request: invalid secret");
        return Err(ApiError::Unauthorized);
    }

    let req: TaskRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid task request: {e}")))?;
    let task = validate(req)?;
    tracing::info!(task = %task.name, round = %task.round, "Task accepted");

    let orchestrator = state.orchestrator.clone();
    let label = format!("{}/round-{}", task.name, task.round);
    state.supervisor.spawn(label, async move {
        // failures are logged by the orchestrator; there is nobody left to tell
        let _ = orchestrator.execute(&task).await;
    });

    Ok(Json(MessageBody {
        message: "Request received. Processing...".to_string(),
    }))
}

fn secret_field(body: &serde_json::Value) -> &str {
    body.get("secret").and_then(|s| s.as_str()).unwrap_or_default()
}

fn validate(req: TaskRequest) -> Result<Task, ApiError> {
    let round = Round::try_from(req.round)
        .map_err(|r| ApiError::BadRequest(format!("round must be 1 or 2, got {r}")))?;
    if !is_valid_repo_name(&req.task) {
        return Err(ApiError::BadRequest(format!(
            "task {:?} is not a valid repository name",
            req.task
        )));
    }
    let url = req.evaluation_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::BadRequest(
            "evaluation_url must be an http(s) URL".to_string(),
        ));
    }
    Ok(Task {
        email: req.email,
        name: req.task,
        round,
        nonce: req.nonce,
        brief: req.brief,
        checks: req.checks,
        evaluation_url: url.to_string(),
    })
}
