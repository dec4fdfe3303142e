//! Handlers and wire types for the v1 API.
//!
//! Operations:
//!
//! - `GET  /health`                      — status probe, unauthenticated
//! - `POST /v1/auth/anonymous`           — issue a bearer token
//! - `POST /v1/sessions`                 — start a session
//! - `POST /v1/sessions/{id}/steps`      — submit the current step
//! - `POST /v1/sessions/{id}/back`       — move the pointer back one step
//! - `POST /v1/sessions/{id}/complete`   — finalize, returning the summary
//! - `POST /v1/analyze`                  — evaluate a reframed belief
//! - `POST /v1/suggest`                  — empathy suggestion + tips
//! - `POST /v1/solutions`                — CBT solution suggestions
//! - `POST /v1/safety`                   — safety screening
//! - `POST /v1/abc/evaluate`             — score a full four-field set
//! - `POST /v1/practice/reply`           — practice-mode friend turn
//! - `GET  /v1/usage`                    — remaining daily AI allowance

use axum::{
    Extension, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AuthedUser, SharedState};
use reframe_core::error::{Error, SessionError};
use reframe_core::{SessionData, SessionKind};
use reframe_counselor::{Personality, StepInput, StepOutcome};

// ── Error envelope ────────────────────────────────────────────────────────

/// A JSON error response: `{"error": "..."}` with the mapped status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Included for 429 responses so clients can show the allowance.
    pub remaining: Option<u32>,
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Authentication required".into(),
            remaining: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            remaining: None,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Session(_) => StatusCode::BAD_REQUEST,
            Error::DailyLimitReached { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal detail stays in the logs, not the child-facing reply.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "Internal error");
            "Something went wrong on our side. Please try again in a moment.".to_string()
        } else {
            err.to_string()
        };

        Self {
            status,
            message,
            remaining: matches!(err, Error::DailyLimitReached { .. }).then_some(0),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.remaining {
            Some(remaining) => serde_json::json!({
                "error": self.message,
                "remaining": remaining,
            }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ── Router ────────────────────────────────────────────────────────────────

/// The v1 routes that skip the bearer-token middleware. Merged with the
/// protected router under "/v1".
pub fn public_router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/auth/anonymous", post(auth_anonymous_handler))
        .with_state(state)
}

/// Routes behind the bearer-token middleware. Nest under "/v1".
pub fn protected_router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(start_session_handler))
        .route("/sessions/{id}/steps", post(submit_step_handler))
        .route("/sessions/{id}/back", post(step_back_handler))
        .route("/sessions/{id}/complete", post(complete_session_handler))
        .route("/analyze", post(analyze_handler))
        .route("/suggest", post(suggest_handler))
        .route("/solutions", post(solutions_handler))
        .route("/safety", post(safety_handler))
        .route("/abc/evaluate", post(abc_evaluate_handler))
        .route("/practice/reply", post(practice_reply_handler))
        .route("/usage", get(usage_handler))
        .with_state(state)
}

// ── Health & auth ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    user_id: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

/// Anonymous sign-in: a fresh user id and a signed token for it.
pub async fn auth_anonymous_handler(State(state): State<SharedState>) -> Json<AuthResponse> {
    let user_id = format!("anon-{}", Uuid::new_v4().simple());
    let (token, expires_at) = state.tokens.issue(&user_id);
    Json(AuthResponse {
        token,
        user_id,
        expires_at,
    })
}

// ── Sessions ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    kind: SessionKind,
}

pub async fn start_session_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Json(payload): Json<StartSessionRequest>,
) -> ApiResult<reframe_core::Session> {
    let session = state.counselor.start_session(&uid, payload.kind).await?;
    Ok(Json(session))
}

pub async fn submit_step_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StepInput>,
) -> ApiResult<StepOutcome> {
    let outcome = state.counselor.submit_step(id, &uid, payload).await?;
    Ok(Json(outcome))
}

pub async fn step_back_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<reframe_core::Session> {
    let session = state.counselor.go_back(id, &uid).await?;
    Ok(Json(session))
}

pub async fn complete_session_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<reframe_core::SessionSummary> {
    let summary = state.counselor.complete_session(id, &uid).await?;
    Ok(Json(summary))
}

// ── Standalone AI operations ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    response: String,
    situation: String,

    #[serde(default)]
    age: Option<u8>,
}

pub async fn analyze_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Json(payload): Json<AnalyzeRequest>,
) -> ApiResult<reframe_counselor::Evaluation> {
    if payload.response.trim().is_empty() {
        return Err(ApiError::invalid("Missing required input 'response'"));
    }
    let evaluation = state
        .counselor
        .analyze_reframe(&uid, &payload.response, &payload.situation, payload.age)
        .await?;
    Ok(Json(evaluation))
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    situation: String,

    #[serde(default)]
    emotions: Vec<String>,

    #[serde(default)]
    age: Option<u8>,
}

pub async fn suggest_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Json(payload): Json<SuggestRequest>,
) -> ApiResult<reframe_counselor::Suggestion> {
    if payload.situation.trim().is_empty() {
        return Err(ApiError::invalid("Missing required input 'situation'"));
    }
    let suggestion = state
        .counselor
        .suggest(&uid, &payload.situation, &payload.emotions, payload.age)
        .await?;
    Ok(Json(suggestion))
}

#[derive(Deserialize)]
pub struct SolutionsRequest {
    problem: String,
    negative_thought: String,

    #[serde(default)]
    age: Option<u8>,
}

pub async fn solutions_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Json(payload): Json<SolutionsRequest>,
) -> ApiResult<reframe_counselor::SolutionSet> {
    if payload.problem.trim().is_empty() {
        return Err(ApiError::invalid("Missing required input 'problem'"));
    }
    let solutions = state
        .counselor
        .solutions(&uid, &payload.problem, &payload.negative_thought, payload.age)
        .await?;
    Ok(Json(solutions))
}

// ── Safety ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SafetyRequest {
    conversation: String,
    session_id: Uuid,
}

pub async fn safety_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Json(payload): Json<SafetyRequest>,
) -> ApiResult<reframe_safety::SafetyVerdict> {
    if payload.conversation.trim().is_empty() {
        return Err(ApiError::invalid("Missing required input 'conversation'"));
    }
    let verdict = state
        .screener
        .assess(&payload.conversation, payload.session_id, &uid)
        .await;
    Ok(Json(verdict))
}

// ── ABC evaluation ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AbcEvaluateRequest {
    situation: String,
    belief: String,
    reframe: String,
    action: String,

    #[serde(default)]
    age: Option<u8>,
}

pub async fn abc_evaluate_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Json(payload): Json<AbcEvaluateRequest>,
) -> ApiResult<reframe_core::SessionSummary> {
    let data = SessionData {
        situation: payload.situation,
        negative_belief: payload.belief,
        reframed_belief: payload.reframe,
        action_plan: payload.action,
        ..Default::default()
    };
    let summary = state.counselor.evaluate_abc(&uid, &data, payload.age).await?;
    Ok(Json(summary))
}

// ── Practice mode ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PracticeTurn {
    speaker: String,
    content: String,
}

#[derive(Deserialize)]
pub struct PracticeRequest {
    #[serde(default)]
    personality: Personality,
    problem: String,
    message: String,

    #[serde(default)]
    history: Vec<PracticeTurn>,
}

pub async fn practice_reply_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
    Json(payload): Json<PracticeRequest>,
) -> ApiResult<reframe_counselor::PracticeReply> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::invalid("Missing required input 'message'"));
    }

    let history: Vec<(String, String)> = payload
        .history
        .iter()
        .map(|turn| {
            let speaker = if turn.speaker == "counselor" {
                "Counselor"
            } else {
                "Friend"
            };
            (speaker.to_string(), turn.content.clone())
        })
        .collect();

    let reply = state
        .counselor
        .practice_reply(
            &uid,
            payload.personality,
            &payload.problem,
            &history,
            &payload.message,
        )
        .await?;
    Ok(Json(reply))
}

// ── Usage ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct UsageResponse {
    limit: u32,
    remaining: u32,
}

pub async fn usage_handler(
    State(state): State<SharedState>,
    Extension(AuthedUser(uid)): Extension<AuthedUser>,
) -> ApiResult<UsageResponse> {
    let gate = state.counselor.gate();
    let remaining = gate.peek(&uid).await.map_err(Error::from)?;
    Ok(Json(UsageResponse {
        limit: gate.limit(),
        remaining,
    }))
}
