//! Session types — the four-step cognitive-reframing exercise.
//!
//! A session walks a child through Situation → negative Belief →
//! Reframed belief → Action plan. Each step captures one required text
//! field; the session completes once all four are present and a summary
//! has been generated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four exercise steps, in order, plus the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// What happened — pre-populated from a scenario or user-described.
    Situation,
    /// The negative belief the child names about the situation.
    Belief,
    /// The reframed, kinder belief the child proposes.
    Reframe,
    /// The concrete action plan.
    Action,
    /// All four fields captured and the summary written.
    Complete,
}

impl Step {
    /// 1-based ordinal used in progress displays and storage.
    pub fn ordinal(self) -> u8 {
        match self {
            Step::Situation => 1,
            Step::Belief => 2,
            Step::Reframe => 3,
            Step::Action => 4,
            Step::Complete => 5,
        }
    }

    /// The step after this one. `Complete` is terminal.
    pub fn next(self) -> Step {
        match self {
            Step::Situation => Step::Belief,
            Step::Belief => Step::Reframe,
            Step::Reframe => Step::Action,
            Step::Action | Step::Complete => Step::Complete,
        }
    }

    /// The step before this one, for backward navigation.
    /// Moving back never erases captured data — only the pointer moves.
    pub fn previous(self) -> Step {
        match self {
            Step::Situation | Step::Belief => Step::Situation,
            Step::Reframe => Step::Belief,
            Step::Action => Step::Reframe,
            Step::Complete => Step::Action,
        }
    }

    /// Stable name used in errors and storage.
    pub fn name(self) -> &'static str {
        match self {
            Step::Situation => "situation",
            Step::Belief => "belief",
            Step::Reframe => "reframe",
            Step::Action => "action",
            Step::Complete => "complete",
        }
    }

    /// Inverse of [`Step::name`], for decoding stored rows.
    pub fn from_name(s: &str) -> Option<Step> {
        match s {
            "situation" => Some(Step::Situation),
            "belief" => Some(Step::Belief),
            "reframe" => Some(Step::Reframe),
            "action" => Some(Step::Action),
            "complete" => Some(Step::Complete),
            _ => None,
        }
    }

    /// The required input field for this step, named for error messages.
    pub fn required_field(self) -> &'static str {
        match self {
            Step::Situation => "situation",
            Step::Belief => "negative_belief",
            Step::Reframe => "reframed_belief",
            Step::Action => "action_plan",
            Step::Complete => "summary",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a session is a real exercise or practice against a virtual friend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    #[default]
    Real,
    Practice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// The per-step fields captured over the life of a session.
///
/// Fields start empty and are filled by validated step submissions.
/// Emotions and severity ride along with the situation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub situation: String,

    #[serde(default)]
    pub negative_belief: String,

    #[serde(default)]
    pub reframed_belief: String,

    #[serde(default)]
    pub action_plan: String,

    /// Emotion labels the child selected alongside the situation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emotions: Vec<String>,

    /// Self-reported severity, 1 (mild) to 5 (serious).
    #[serde(default = "default_severity")]
    pub severity: u8,
}

fn default_severity() -> u8 {
    3
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            situation: String::new(),
            negative_belief: String::new(),
            reframed_belief: String::new(),
            action_plan: String::new(),
            emotions: Vec::new(),
            severity: default_severity(),
        }
    }
}

impl SessionData {
    /// The captured text for a given step, if any.
    pub fn field(&self, step: Step) -> &str {
        match step {
            Step::Situation => &self.situation,
            Step::Belief => &self.negative_belief,
            Step::Reframe => &self.reframed_belief,
            Step::Action => &self.action_plan,
            Step::Complete => "",
        }
    }

    /// True once every step field holds non-whitespace text.
    pub fn all_steps_filled(&self) -> bool {
        [Step::Situation, Step::Belief, Step::Reframe, Step::Action]
            .iter()
            .all(|s| !self.field(*s).trim().is_empty())
    }
}

/// A counseling session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub current_step: Step,
    pub data: SessionData,
    pub status: SessionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

impl Session {
    /// Start a fresh session at the situation step.
    pub fn new(user_id: impl Into<String>, kind: SessionKind, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            started_at: now,
            current_step: Step::Situation,
            data: SessionData::default(),
            status: SessionStatus::Active,
            completed_at: None,
            summary: None,
        }
    }
}

/// One immutable record per accepted step submission.
///
/// Corrections in the same step append a new record; history is never
/// overwritten. Replaying the records in order reproduces the session's
/// final `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub step: Step,
    pub user_input: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,

    /// The AI feedback attached to this submission, when the step has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

/// The aggregate summary written when a session completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub scores: SummaryScores,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strengths: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    pub encouragement: String,
}

/// Four 0–100 sub-scores, one per step, plus the 0–100 overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryScores {
    pub situation: u8,
    pub belief: u8,
    pub reframe: u8,
    pub action: u8,
    pub overall: u8,
}

impl SummaryScores {
    /// Clamp every score into 0–100.
    pub fn clamped(self) -> Self {
        Self {
            situation: self.situation.min(100),
            belief: self.belief.min(100),
            reframe: self.reframe.min(100),
            action: self.action.min(100),
            overall: self.overall.min(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_advance_in_order_without_skipping() {
        let mut step = Step::Situation;
        let expected = [Step::Belief, Step::Reframe, Step::Action, Step::Complete];
        for want in expected {
            step = step.next();
            assert_eq!(step, want);
        }
        // Terminal state stays put
        assert_eq!(Step::Complete.next(), Step::Complete);
    }

    #[test]
    fn backward_navigation_floors_at_situation() {
        assert_eq!(Step::Situation.previous(), Step::Situation);
        assert_eq!(Step::Reframe.previous(), Step::Belief);
    }

    #[test]
    fn all_steps_filled_requires_non_whitespace() {
        let mut data = SessionData {
            situation: "received a low test score".into(),
            negative_belief: "I'm stupid".into(),
            reframed_belief: "everyone makes mistakes sometimes".into(),
            action_plan: "   ".into(),
            ..Default::default()
        };
        assert!(!data.all_steps_filled());

        data.action_plan = "ask the teacher for help".into();
        assert!(data.all_steps_filled());
    }

    #[test]
    fn session_serialization_roundtrip() {
        let session = Session::new("user_1", SessionKind::Real, Utc::now());
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.current_step, Step::Situation);
        assert_eq!(back.user_id, "user_1");
    }
}
