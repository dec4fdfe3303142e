//! In-memory store — for tests and ephemeral development runs.
//!
//! Same semantics as the SQLite backend, including the atomic usage
//! consume: the check and the increment happen under one lock.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reframe_core::error::StoreError;
use reframe_core::{
    AlertNotification, RiskAssessment, Session, SessionStatus, SessionSummary, StepResponse,
    Store, UrgentAlert, UsageDecision, UserProfile,
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    step_responses: Vec<StepResponse>,
    assessments: Vec<RiskAssessment>,
    alerts: Vec<UrgentAlert>,
    notifications: Vec<AlertNotification>,
    usage: HashMap<(String, NaiveDate), u32>,
    profiles: HashMap<String, UserProfile>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All recorded alerts, for test assertions.
    pub fn alerts(&self) -> Vec<UrgentAlert> {
        self.lock().alerts.clone()
    }

    /// All recorded notifications, for test assertions.
    pub fn notifications(&self) -> Vec<AlertNotification> {
        self.lock().notifications.clone()
    }

    /// All recorded risk assessments, for test assertions.
    pub fn assessments(&self) -> Vec<RiskAssessment> {
        self.lock().assessments.clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        self.lock().sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.lock().sessions.get(&id).cloned())
    }

    async fn update_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.sessions.contains_key(&session.id) {
            return Err(StoreError::QueryFailed(format!(
                "No session {} to update",
                session.id
            )));
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn finalize_session(
        &self,
        id: Uuid,
        summary: &SessionSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or_else(|| StoreError::QueryFailed(format!("No session {id} to finalize")))?;
        session.status = SessionStatus::Completed;
        session.completed_at = Some(completed_at);
        session.summary = Some(summary.clone());
        Ok(())
    }

    async fn append_step_response(&self, response: &StepResponse) -> Result<(), StoreError> {
        self.lock().step_responses.push(response.clone());
        Ok(())
    }

    async fn step_responses(&self, session_id: Uuid) -> Result<Vec<StepResponse>, StoreError> {
        Ok(self
            .lock()
            .step_responses
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn record_risk_assessment(&self, assessment: &RiskAssessment) -> Result<(), StoreError> {
        self.lock().assessments.push(assessment.clone());
        Ok(())
    }

    async fn record_urgent_alert(&self, alert: &UrgentAlert) -> Result<(), StoreError> {
        self.lock().alerts.push(alert.clone());
        Ok(())
    }

    async fn record_alert_notification(
        &self,
        notification: &AlertNotification,
    ) -> Result<(), StoreError> {
        self.lock().notifications.push(notification.clone());
        Ok(())
    }

    async fn pending_alerts(&self) -> Result<Vec<UrgentAlert>, StoreError> {
        Ok(self
            .lock()
            .alerts
            .iter()
            .filter(|a| a.status == reframe_core::AlertStatus::Pending)
            .cloned()
            .collect())
    }

    async fn try_consume_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        limit: u32,
    ) -> Result<UsageDecision, StoreError> {
        let mut inner = self.lock();
        let count = inner.usage.entry((user_id.to_string(), date)).or_insert(0);
        if *count >= limit {
            return Ok(UsageDecision {
                allowed: false,
                count: *count,
            });
        }
        *count += 1;
        Ok(UsageDecision {
            allowed: true,
            count: *count,
        })
    }

    async fn usage_count(&self, user_id: &str, date: NaiveDate) -> Result<u32, StoreError> {
        Ok(self
            .lock()
            .usage
            .get(&(user_id.to_string(), date))
            .copied()
            .unwrap_or(0))
    }

    async fn get_or_create_profile(&self, uid: &str) -> Result<UserProfile, StoreError> {
        let mut inner = self.lock();
        Ok(inner
            .profiles
            .entry(uid.to_string())
            .or_insert_with(|| UserProfile::new(uid, Utc::now()))
            .clone())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.lock()
            .profiles
            .insert(profile.uid.clone(), profile.clone());
        Ok(())
    }
}
