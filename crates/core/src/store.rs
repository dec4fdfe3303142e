//! Store trait — the abstraction over the document store.
//!
//! Sessions, step responses, risk assessments, alerts, usage counters,
//! and user profiles live behind this trait. Step responses and safety
//! records are append-only; the only permitted update on a completed
//! session is the terminal summary write.
//!
//! Implementations: SQLite (production), in-memory (testing).

use crate::error::StoreError;
use crate::profile::UserProfile;
use crate::safety::{RiskAssessment, UrgentAlert};
use crate::session::{Session, SessionSummary, StepResponse};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of an atomic usage-counter consume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDecision {
    /// Whether the call may proceed.
    pub allowed: bool,
    /// The counter value after the attempt (unchanged when denied).
    pub count: u32,
}

/// A notification record written alongside an urgent alert so a guardian
/// or counselor surface can pick it up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNotification {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub user_id: String,
    /// Who this notification is for (e.g., "guardian", "counselor").
    pub audience: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// The document-store trait all persistence goes through.
#[async_trait]
pub trait Store: Send + Sync {
    /// The backend name (e.g., "sqlite", "in-memory").
    fn name(&self) -> &str;

    // --- Sessions ---

    async fn create_session(&self, session: &Session) -> std::result::Result<(), StoreError>;

    async fn get_session(&self, id: Uuid) -> std::result::Result<Option<Session>, StoreError>;

    /// Persist step-pointer and captured-data changes on an active session.
    async fn update_session(&self, session: &Session) -> std::result::Result<(), StoreError>;

    /// The single permitted terminal update: status, completion time, summary.
    async fn finalize_session(
        &self,
        id: Uuid,
        summary: &SessionSummary,
        completed_at: DateTime<Utc>,
    ) -> std::result::Result<(), StoreError>;

    // --- Step responses (append-only) ---

    async fn append_step_response(
        &self,
        response: &StepResponse,
    ) -> std::result::Result<(), StoreError>;

    /// All responses for a session in insertion order.
    async fn step_responses(
        &self,
        session_id: Uuid,
    ) -> std::result::Result<Vec<StepResponse>, StoreError>;

    // --- Safety records (insert-only) ---

    async fn record_risk_assessment(
        &self,
        assessment: &RiskAssessment,
    ) -> std::result::Result<(), StoreError>;

    async fn record_urgent_alert(
        &self,
        alert: &UrgentAlert,
    ) -> std::result::Result<(), StoreError>;

    async fn record_alert_notification(
        &self,
        notification: &AlertNotification,
    ) -> std::result::Result<(), StoreError>;

    /// Alerts still awaiting review, oldest first.
    async fn pending_alerts(&self) -> std::result::Result<Vec<UrgentAlert>, StoreError>;

    // --- Usage counters ---

    /// Atomically increment the (user, date) counter if it is below `limit`.
    ///
    /// This is a single conditional write, not a read-then-write: two
    /// concurrent calls at `limit - 1` must not both succeed.
    async fn try_consume_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        limit: u32,
    ) -> std::result::Result<UsageDecision, StoreError>;

    /// Current counter value without consuming.
    async fn usage_count(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> std::result::Result<u32, StoreError>;

    // --- Profiles ---

    async fn get_or_create_profile(
        &self,
        uid: &str,
    ) -> std::result::Result<UserProfile, StoreError>;

    async fn save_profile(&self, profile: &UserProfile) -> std::result::Result<(), StoreError>;
}

/// Today's date key for usage counters, UTC.
pub fn usage_date_today() -> NaiveDate {
    Utc::now().date_naive()
}
