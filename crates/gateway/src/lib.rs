//! HTTP API gateway for Reframe.
//!
//! Exposes the POST-only JSON operations the front end calls: session
//! start and step progression, the standalone AI helpers, and the safety
//! check. Built on Axum.
//!
//! Security layers applied:
//! - Bearer-token authentication on all /v1 routes except token issuance
//! - CORS restricted to the configured front-end origins
//! - Request body size limit (1 MB)
//! - In-memory sliding-window request limiting per client
//! - HTTP trace logging

pub mod api;
pub mod auth;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{self, Next},
    routing::get,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use reframe_core::{Provider, Store, TokenVerifier};
use reframe_counselor::Counselor;
use reframe_safety::Screener;

/// Shared application state.
///
/// Everything is constructed once at startup and injected here — no
/// process-wide singletons. Tests build the same state around fakes.
pub struct AppState {
    pub counselor: Counselor,
    pub screener: Screener,
    pub store: Arc<dyn Store>,
    pub tokens: auth::TokenAuthority,
    pub config: reframe_config::AppConfig,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedState = Arc<AppState>;

/// Assemble the application state from its collaborators.
pub fn build_state(
    config: reframe_config::AppConfig,
    provider: Arc<dyn Provider>,
    store: Arc<dyn Store>,
) -> SharedState {
    Arc::new(AppState {
        counselor: Counselor::new(&config, provider.clone(), store.clone()),
        screener: Screener::new(&config.safety, provider, store.clone()),
        store,
        tokens: auth::TokenAuthority::from_config(&config.gateway),
        config,
        start_time: chrono::Utc::now(),
    })
}

/// Build the full router with all middleware layers.
pub fn build_router(state: SharedState) -> Router {
    let protected = api::protected_router(state.clone()).layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));
    let v1 = api::public_router(state.clone()).merge(protected);

    let cors = cors_layer(&state.config.gateway.allowed_origins);

    let rate_limiter = Arc::new(RateLimiter::new(
        state.config.gateway.requests_per_minute,
        std::time::Duration::from_secs(60),
    ));

    Router::new()
        .route("/health", get(api::health_handler))
        .nest("/v1", v1)
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: reframe_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");

    let provider = reframe_providers::build_from_config(&config)?;

    let store: Arc<dyn Store> = match config.store.backend.as_str() {
        "in-memory" => Arc::new(reframe_store::InMemoryStore::new()),
        _ => Arc::new(reframe_store::SqliteStore::new(&config.store.path).await?),
    };

    let state = build_state(config, provider, store);
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Authentication ---

/// The verified caller, inserted into request extensions by
/// [`auth_middleware`] and read by every protected handler.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

/// Authentication middleware for the protected /v1 routes.
///
/// Requires a valid `Authorization: Bearer <token>` header and maps it to
/// a stable user id.
async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, api::ApiError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(api::ApiError::unauthenticated)?;

    match state.tokens.verify(token) {
        Ok(uid) => {
            req.extensions_mut().insert(AuthedUser(uid));
            Ok(next.run(req).await)
        }
        Err(e) => {
            warn!(error = %e, "Rejected bearer token");
            Err(api::ApiError::unauthenticated())
        }
    }
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window request limiter.
///
/// Tracks request timestamps per client key (bearer token or anonymous).
/// This is request-level flood protection; the per-user daily AI
/// allowance is enforced separately by the usage gate.
struct RateLimiter {
    max_requests: usize,
    window: std::time::Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Evict stale entries if the map grows unreasonably
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Request limiting middleware. The /health endpoint is exempt so
/// monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(
            client = %client_key.chars().take(20).collect::<String>(),
            "Request limit exceeded"
        );
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}
