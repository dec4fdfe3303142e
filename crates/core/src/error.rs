//! Error types for the Reframe domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Reframe operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Auth errors ---
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    // --- Daily usage ceiling ---
    #[error("Daily AI usage limit of {limit} reached")]
    DailyLimitReached { limit: u32 },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Response blocked by provider safety filter: {0}")]
    Blocked(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Missing required input '{field}' for step {step}")]
    MissingField { step: &'static str, field: &'static str },

    #[error("Out-of-order step submission: session is at {expected}, got {got}")]
    OutOfOrder { expected: &'static str, got: &'static str },

    #[error("No record for prior step {step}; cannot accept this submission")]
    MissingPriorStep { step: &'static str },

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already completed: {0}")]
    AlreadyCompleted(String),
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn session_error_names_missing_field() {
        let err = Error::Session(SessionError::MissingField {
            step: "reframe",
            field: "reframed_belief",
        });
        assert!(err.to_string().contains("reframed_belief"));
        assert!(err.to_string().contains("reframe"));
    }

    #[test]
    fn daily_limit_mentions_ceiling() {
        let err = Error::DailyLimitReached { limit: 5 };
        assert!(err.to_string().contains('5'));
    }
}
