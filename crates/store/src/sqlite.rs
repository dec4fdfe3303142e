//! SQLite backend.
//!
//! A single database file with one table per collection. Step responses,
//! risk assessments, alerts, and notifications are insert-only; sessions
//! get exactly two kinds of update (progress, terminal finalize); usage
//! counters are incremented through a single conditional upsert so the
//! daily ceiling holds under concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reframe_core::error::StoreError;
use reframe_core::profile::BadgeAward;
use reframe_core::{
    AlertNotification, AlertStatus, RiskAssessment, RiskLevel, Session, SessionData, SessionKind,
    SessionStatus, SessionSummary, Step, StepResponse, Store, UrgentAlert, UsageDecision,
    UserProfile,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL,
                kind          TEXT NOT NULL,
                started_at    TEXT NOT NULL,
                current_step  TEXT NOT NULL,
                data          TEXT NOT NULL,
                status        TEXT NOT NULL,
                completed_at  TEXT,
                summary       TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS step_responses (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                session_id   TEXT NOT NULL,
                step         TEXT NOT NULL,
                user_input   TEXT NOT NULL,
                scenario_id  TEXT,
                analysis     TEXT,
                created_at   TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS risk_assessments (
                iid                      INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id               TEXT NOT NULL,
                user_id                  TEXT NOT NULL,
                conversation_text        TEXT NOT NULL,
                detected_keywords        TEXT NOT NULL DEFAULT '[]',
                risk_level               TEXT NOT NULL,
                ai_concerns              TEXT NOT NULL DEFAULT '[]',
                immediate_action_needed  INTEGER NOT NULL DEFAULT 0,
                created_at               TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS urgent_alerts (
                id                 TEXT PRIMARY KEY,
                session_id         TEXT NOT NULL,
                user_id            TEXT NOT NULL,
                conversation_text  TEXT NOT NULL,
                detected_keywords  TEXT NOT NULL DEFAULT '[]',
                risk_level         TEXT NOT NULL,
                ai_analysis        TEXT,
                status             TEXT NOT NULL,
                created_at         TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS alert_notifications (
                id          TEXT PRIMARY KEY,
                alert_id    TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                audience    TEXT NOT NULL,
                message     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS usage_counters (
                user_id  TEXT NOT NULL,
                date     TEXT NOT NULL,
                count    INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, date)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                uid                 TEXT PRIMARY KEY,
                nickname            TEXT NOT NULL DEFAULT '',
                level               INTEGER NOT NULL DEFAULT 1,
                experience          INTEGER NOT NULL DEFAULT 0,
                skills              TEXT NOT NULL DEFAULT '{}',
                badges              TEXT NOT NULL DEFAULT '{}',
                sessions_completed  INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_step_responses_session
             ON step_responses(session_id)",
            "CREATE INDEX IF NOT EXISTS idx_urgent_alerts_status
             ON urgent_alerts(status, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_sessions_user
             ON sessions(user_id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StoreError> {
        let id: String = get(row, "id")?;
        let user_id: String = get(row, "user_id")?;
        let kind: String = get(row, "kind")?;
        let started_at: String = get(row, "started_at")?;
        let current_step: String = get(row, "current_step")?;
        let data_json: String = get(row, "data")?;
        let status: String = get(row, "status")?;
        let completed_at: Option<String> = get(row, "completed_at")?;
        let summary_json: Option<String> = get(row, "summary")?;

        let data: SessionData = serde_json::from_str(&data_json)
            .map_err(|e| StoreError::QueryFailed(format!("session data column: {e}")))?;
        let summary: Option<SessionSummary> = match summary_json {
            Some(json) => Some(
                serde_json::from_str(&json)
                    .map_err(|e| StoreError::QueryFailed(format!("session summary column: {e}")))?,
            ),
            None => None,
        };

        Ok(Session {
            id: parse_uuid(&id)?,
            user_id,
            kind: match kind.as_str() {
                "practice" => SessionKind::Practice,
                _ => SessionKind::Real,
            },
            started_at: parse_timestamp(&started_at),
            current_step: Step::from_name(&current_step)
                .ok_or_else(|| StoreError::QueryFailed(format!("Unknown step '{current_step}'")))?,
            data,
            status: match status.as_str() {
                "completed" => SessionStatus::Completed,
                _ => SessionStatus::Active,
            },
            completed_at: completed_at.map(|t| parse_timestamp(&t)),
            summary,
        })
    }

    fn row_to_step_response(row: &sqlx::sqlite::SqliteRow) -> Result<StepResponse, StoreError> {
        let id: String = get(row, "id")?;
        let session_id: String = get(row, "session_id")?;
        let step: String = get(row, "step")?;
        let user_input: String = get(row, "user_input")?;
        let scenario_id: Option<String> = get(row, "scenario_id")?;
        let analysis_json: Option<String> = get(row, "analysis")?;
        let created_at: String = get(row, "created_at")?;

        Ok(StepResponse {
            id: parse_uuid(&id)?,
            session_id: parse_uuid(&session_id)?,
            step: Step::from_name(&step)
                .ok_or_else(|| StoreError::QueryFailed(format!("Unknown step '{step}'")))?,
            user_input,
            scenario_id,
            analysis: analysis_json.and_then(|json| serde_json::from_str(&json).ok()),
            created_at: parse_timestamp(&created_at),
        })
    }

    fn row_to_alert(row: &sqlx::sqlite::SqliteRow) -> Result<UrgentAlert, StoreError> {
        let id: String = get(row, "id")?;
        let session_id: String = get(row, "session_id")?;
        let user_id: String = get(row, "user_id")?;
        let conversation_text: String = get(row, "conversation_text")?;
        let keywords_json: String = get(row, "detected_keywords")?;
        let risk_level: String = get(row, "risk_level")?;
        let ai_analysis_json: Option<String> = get(row, "ai_analysis")?;
        let status: String = get(row, "status")?;
        let created_at: String = get(row, "created_at")?;

        Ok(UrgentAlert {
            id: parse_uuid(&id)?,
            session_id: parse_uuid(&session_id)?,
            user_id,
            conversation_text,
            detected_keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
            risk_level: RiskLevel::from_name(&risk_level).unwrap_or(RiskLevel::Unknown),
            ai_analysis: ai_analysis_json.and_then(|json| serde_json::from_str(&json).ok()),
            status: match status.as_str() {
                "resolved" => AlertStatus::Resolved,
                _ => AlertStatus::Pending,
            },
            created_at: parse_timestamp(&created_at),
        })
    }
}

fn get<'r, T>(row: &'r sqlx::sqlite::SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| StoreError::QueryFailed(format!("{column} column: {e}")))
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::QueryFailed(format!("Invalid uuid '{s}': {e}")))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn kind_name(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Real => "real",
        SessionKind::Practice => "practice",
    }
}

fn status_name(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let data = serde_json::to_string(&session.data)
            .map_err(|e| StoreError::Storage(format!("Encode session data: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, kind, started_at, current_step, data, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.user_id)
        .bind(kind_name(session.kind))
        .bind(session.started_at.to_rfc3339())
        .bind(session.current_step.name())
        .bind(data)
        .bind(status_name(session.status))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("create session: {e}")))?;

        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get session: {e}")))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn update_session(&self, session: &Session) -> Result<(), StoreError> {
        let data = serde_json::to_string(&session.data)
            .map_err(|e| StoreError::Storage(format!("Encode session data: {e}")))?;

        let result = sqlx::query(
            r#"
            UPDATE sessions SET current_step = ?, data = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(session.current_step.name())
        .bind(data)
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("update session: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::QueryFailed(format!(
                "No active session {} to update",
                session.id
            )));
        }
        Ok(())
    }

    async fn finalize_session(
        &self,
        id: Uuid,
        summary: &SessionSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let summary_json = serde_json::to_string(summary)
            .map_err(|e| StoreError::Storage(format!("Encode summary: {e}")))?;

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'completed', current_step = 'complete',
                completed_at = ?, summary = ?
            WHERE id = ?
            "#,
        )
        .bind(completed_at.to_rfc3339())
        .bind(summary_json)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("finalize session: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::QueryFailed(format!(
                "No session {id} to finalize"
            )));
        }
        Ok(())
    }

    async fn append_step_response(&self, response: &StepResponse) -> Result<(), StoreError> {
        let analysis = response
            .analysis
            .as_ref()
            .map(|a| a.to_string());

        sqlx::query(
            r#"
            INSERT INTO step_responses
                (id, session_id, step, user_input, scenario_id, analysis, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(response.id.to_string())
        .bind(response.session_id.to_string())
        .bind(response.step.name())
        .bind(&response.user_input)
        .bind(&response.scenario_id)
        .bind(analysis)
        .bind(response.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("append step response: {e}")))?;

        Ok(())
    }

    async fn step_responses(&self, session_id: Uuid) -> Result<Vec<StepResponse>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM step_responses WHERE session_id = ? ORDER BY iid ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list step responses: {e}")))?;

        rows.iter().map(Self::row_to_step_response).collect()
    }

    async fn record_risk_assessment(&self, assessment: &RiskAssessment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO risk_assessments
                (session_id, user_id, conversation_text, detected_keywords,
                 risk_level, ai_concerns, immediate_action_needed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assessment.session_id.to_string())
        .bind(&assessment.user_id)
        .bind(&assessment.conversation_text)
        .bind(serde_json::to_string(&assessment.detected_keywords).unwrap_or_else(|_| "[]".into()))
        .bind(assessment.risk_level.name())
        .bind(serde_json::to_string(&assessment.ai_concerns).unwrap_or_else(|_| "[]".into()))
        .bind(assessment.immediate_action_needed as i64)
        .bind(assessment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("record risk assessment: {e}")))?;

        Ok(())
    }

    async fn record_urgent_alert(&self, alert: &UrgentAlert) -> Result<(), StoreError> {
        let ai_analysis = alert.ai_analysis.as_ref().map(|a| a.to_string());

        sqlx::query(
            r#"
            INSERT INTO urgent_alerts
                (id, session_id, user_id, conversation_text, detected_keywords,
                 risk_level, ai_analysis, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(alert.id.to_string())
        .bind(alert.session_id.to_string())
        .bind(&alert.user_id)
        .bind(&alert.conversation_text)
        .bind(serde_json::to_string(&alert.detected_keywords).unwrap_or_else(|_| "[]".into()))
        .bind(alert.risk_level.name())
        .bind(ai_analysis)
        .bind(match alert.status {
            AlertStatus::Pending => "pending",
            AlertStatus::Resolved => "resolved",
        })
        .bind(alert.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("record urgent alert: {e}")))?;

        Ok(())
    }

    async fn record_alert_notification(
        &self,
        notification: &AlertNotification,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO alert_notifications (id, alert_id, user_id, audience, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.id.to_string())
        .bind(notification.alert_id.to_string())
        .bind(&notification.user_id)
        .bind(&notification.audience)
        .bind(&notification.message)
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("record alert notification: {e}")))?;

        Ok(())
    }

    async fn pending_alerts(&self) -> Result<Vec<UrgentAlert>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM urgent_alerts WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list pending alerts: {e}")))?;

        rows.iter().map(Self::row_to_alert).collect()
    }

    async fn try_consume_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        limit: u32,
    ) -> Result<UsageDecision, StoreError> {
        if limit == 0 {
            let count = self.usage_count(user_id, date).await?;
            return Ok(UsageDecision { allowed: false, count });
        }

        // Single conditional upsert: check and increment are one atomic
        // statement, so concurrent callers cannot both pass at limit - 1.
        let result = sqlx::query(
            r#"
            INSERT INTO usage_counters (user_id, date, count) VALUES (?, ?, 1)
            ON CONFLICT(user_id, date) DO UPDATE SET count = count + 1
            WHERE count < ?
            "#,
        )
        .bind(user_id)
        .bind(date.to_string())
        .bind(limit as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("consume usage: {e}")))?;

        let count = self.usage_count(user_id, date).await?;
        Ok(UsageDecision {
            allowed: result.rows_affected() > 0,
            count,
        })
    }

    async fn usage_count(&self, user_id: &str, date: NaiveDate) -> Result<u32, StoreError> {
        let row = sqlx::query("SELECT count FROM usage_counters WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(date.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("usage count: {e}")))?;

        Ok(row
            .map(|r| r.try_get::<i64, _>("count").unwrap_or(0) as u32)
            .unwrap_or(0))
    }

    async fn get_or_create_profile(&self, uid: &str) -> Result<UserProfile, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (uid, created_at) VALUES (?, ?)
            ON CONFLICT(uid) DO NOTHING
            "#,
        )
        .bind(uid)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("ensure profile: {e}")))?;

        let row = sqlx::query("SELECT * FROM profiles WHERE uid = ?")
            .bind(uid)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get profile: {e}")))?;

        let skills_json: String = get(&row, "skills")?;
        let badges_json: String = get(&row, "badges")?;
        let skills: BTreeMap<String, u32> = serde_json::from_str(&skills_json).unwrap_or_default();
        let badges: BTreeMap<String, BadgeAward> =
            serde_json::from_str(&badges_json).unwrap_or_default();
        let created_at: String = get(&row, "created_at")?;

        Ok(UserProfile {
            uid: get(&row, "uid")?,
            nickname: get(&row, "nickname")?,
            level: get::<i64>(&row, "level")? as u32,
            experience: get::<i64>(&row, "experience")? as u32,
            skills,
            badges,
            sessions_completed: get::<i64>(&row, "sessions_completed")? as u32,
            created_at: parse_timestamp(&created_at),
        })
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let skills = serde_json::to_string(&profile.skills)
            .map_err(|e| StoreError::Storage(format!("Encode skills: {e}")))?;
        let badges = serde_json::to_string(&profile.badges)
            .map_err(|e| StoreError::Storage(format!("Encode badges: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO profiles
                (uid, nickname, level, experience, skills, badges, sessions_completed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(uid) DO UPDATE SET
                nickname = excluded.nickname,
                level = excluded.level,
                experience = excluded.experience,
                skills = excluded.skills,
                badges = excluded.badges,
                sessions_completed = excluded.sessions_completed
            "#,
        )
        .bind(&profile.uid)
        .bind(&profile.nickname)
        .bind(profile.level as i64)
        .bind(profile.experience as i64)
        .bind(skills)
        .bind(badges)
        .bind(profile.sessions_completed as i64)
        .bind(profile.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("save profile: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reframe_core::session::SummaryScores;

    // A shared `:memory:` database does not survive a connection pool, so
    // tests run against a real file in a temp dir.
    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::new(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let (store, _dir) = test_store().await;
        let mut session = Session::new("kid", SessionKind::Real, Utc::now());
        session.data.situation = "received a low test score".into();
        store.create_session(&session).await.unwrap();

        let loaded = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "kid");
        assert_eq!(loaded.current_step, Step::Situation);
        assert_eq!(loaded.data.situation, "received a low test score");
    }

    #[tokio::test]
    async fn update_requires_active_session() {
        let (store, _dir) = test_store().await;
        let session = Session::new("kid", SessionKind::Real, Utc::now());
        store.create_session(&session).await.unwrap();

        let summary = SessionSummary {
            scores: SummaryScores {
                situation: 80,
                belief: 75,
                reframe: 85,
                action: 90,
                overall: 82,
            },
            strengths: vec![],
            suggestions: vec![],
            encouragement: "Nice work".into(),
        };
        store
            .finalize_session(session.id, &summary, Utc::now())
            .await
            .unwrap();

        // Progress updates are rejected once the session is completed.
        let mut stale = session.clone();
        stale.current_step = Step::Belief;
        assert!(store.update_session(&stale).await.is_err());

        let loaded = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Completed);
        assert_eq!(loaded.summary.unwrap().scores.overall, 82);
    }

    #[tokio::test]
    async fn usage_ceiling_holds() {
        let (store, _dir) = test_store().await;
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        for _ in 0..3 {
            assert!(store.try_consume_usage("kid", date, 3).await.unwrap().allowed);
        }
        let denied = store.try_consume_usage("kid", date, 3).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.count, 3);
        assert_eq!(store.usage_count("kid", date).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn usage_ceiling_holds_under_concurrent_calls() {
        let (store, _dir) = test_store().await;
        let store = std::sync::Arc::new(store);
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.try_consume_usage("kid", date, 5).await.unwrap().allowed
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 5);
        assert_eq!(store.usage_count("kid", date).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn step_history_is_ordered_and_immutable() {
        let (store, _dir) = test_store().await;
        let session = Session::new("kid", SessionKind::Real, Utc::now());
        store.create_session(&session).await.unwrap();

        for (step, input) in [
            (Step::Situation, "a test went badly"),
            (Step::Belief, "I'm stupid"),
            (Step::Belief, "I always mess up"),
        ] {
            store
                .append_step_response(&StepResponse {
                    id: Uuid::new_v4(),
                    session_id: session.id,
                    step,
                    user_input: input.into(),
                    scenario_id: None,
                    analysis: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let history = store.step_responses(session.id).await.unwrap();
        assert_eq!(history.len(), 3);
        // Corrections append; both belief records survive in order.
        assert_eq!(history[1].user_input, "I'm stupid");
        assert_eq!(history[2].user_input, "I always mess up");
    }

    #[tokio::test]
    async fn alert_roundtrip_with_pending_filter() {
        let (store, _dir) = test_store().await;
        let alert = UrgentAlert {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            user_id: "kid".into(),
            conversation_text: "I want to disappear".into(),
            detected_keywords: vec!["want to disappear".into()],
            risk_level: RiskLevel::High,
            ai_analysis: None,
            status: AlertStatus::Pending,
            created_at: Utc::now(),
        };
        store.record_urgent_alert(&alert).await.unwrap();

        let pending = store.pending_alerts().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].risk_level, RiskLevel::High);
        assert_eq!(pending[0].detected_keywords, vec!["want to disappear"]);
    }

    #[tokio::test]
    async fn profile_save_and_reload() {
        let (store, _dir) = test_store().await;
        let mut profile = store.get_or_create_profile("kid").await.unwrap();
        profile.add_experience(230);
        profile.add_skill_points("reframing", 15);
        profile.award_badge("first_session", "First Session", Utc::now());
        store.save_profile(&profile).await.unwrap();

        let back = store.get_or_create_profile("kid").await.unwrap();
        assert_eq!(back.level, 3);
        assert_eq!(back.experience, 230);
        assert_eq!(back.skills.get("reframing"), Some(&15));
        assert!(back.badges.contains_key("first_session"));
    }
}
