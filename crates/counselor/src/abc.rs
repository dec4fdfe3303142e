//! The four-step controller.
//!
//! Pure state-machine rules: what a submission must look like for the
//! session to advance, and how the session record changes when it does.
//! The async orchestration around these rules (AI feedback, persistence)
//! lives in [`crate::service`].

use reframe_core::error::SessionError;
use reframe_core::{Session, SessionStatus, SessionSummary, Step};
use serde::{Deserialize, Serialize};

/// One step submission as the caller sends it.
///
/// Emotions and severity are only meaningful on the situation step and
/// are ignored elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInput {
    pub step: Step,
    pub input: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emotions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,
}

impl StepInput {
    pub fn new(step: Step, input: impl Into<String>) -> Self {
        Self {
            step,
            input: input.into(),
            scenario_id: None,
            emotions: Vec::new(),
            severity: None,
        }
    }
}

/// The result handed back to the caller after an accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub session: Session,

    /// AI or fixed feedback for the accepted step, when the step has any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<serde_json::Value>,

    /// Present only when this submission completed the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

/// Check a submission against the session's state.
///
/// On rejection the session is untouched: steps cannot be skipped, empty
/// input never advances, and a reframe needs a belief record behind it
/// (defends against replay from a second tab).
pub fn validate(
    session: &Session,
    step: Step,
    input: &str,
    has_belief_record: bool,
) -> Result<(), SessionError> {
    if session.status == SessionStatus::Completed {
        return Err(SessionError::AlreadyCompleted(session.id.to_string()));
    }

    if step == Step::Complete || step != session.current_step {
        return Err(SessionError::OutOfOrder {
            expected: session.current_step.name(),
            got: step.name(),
        });
    }

    if input.trim().is_empty() {
        return Err(SessionError::MissingField {
            step: step.name(),
            field: step.required_field(),
        });
    }

    if step == Step::Reframe && !has_belief_record {
        return Err(SessionError::MissingPriorStep {
            step: Step::Belief.name(),
        });
    }

    Ok(())
}

/// Record the accepted submission and move the pointer forward by one.
pub fn apply(session: &mut Session, submission: &StepInput) {
    let input = submission.input.trim();
    match submission.step {
        Step::Situation => {
            session.data.situation = input.to_string();
            if !submission.emotions.is_empty() {
                session.data.emotions = submission.emotions.clone();
            }
            if let Some(severity) = submission.severity {
                session.data.severity = severity.clamp(1, 5);
            }
        }
        Step::Belief => session.data.negative_belief = input.to_string(),
        Step::Reframe => session.data.reframed_belief = input.to_string(),
        Step::Action => session.data.action_plan = input.to_string(),
        Step::Complete => {}
    }
    session.current_step = submission.step.next();
}

/// Move the pointer backward by one. Captured data stays in place — a
/// later submission for the revisited step appends a fresh record.
pub fn step_back(session: &mut Session) {
    session.current_step = session.current_step.previous();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reframe_core::SessionKind;

    fn session_at(step: Step) -> Session {
        let mut session = Session::new("kid", SessionKind::Real, Utc::now());
        session.current_step = step;
        session
    }

    #[test]
    fn empty_input_is_rejected_and_names_the_field() {
        let session = session_at(Step::Belief);
        let err = validate(&session, Step::Belief, "   \n ", true).unwrap_err();
        match err {
            SessionError::MissingField { step, field } => {
                assert_eq!(step, "belief");
                assert_eq!(field, "negative_belief");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reframe_without_belief_record_is_rejected() {
        let mut session = session_at(Step::Reframe);
        session.data.negative_belief = "I'm stupid".into();

        let err = validate(&session, Step::Reframe, "a kinder thought", false).unwrap_err();
        assert!(matches!(err, SessionError::MissingPriorStep { step: "belief" }));

        // State unchanged on rejection.
        assert_eq!(session.current_step, Step::Reframe);
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let session = session_at(Step::Situation);
        let err = validate(&session, Step::Reframe, "text", true).unwrap_err();
        assert!(matches!(
            err,
            SessionError::OutOfOrder { expected: "situation", got: "reframe" }
        ));
    }

    #[test]
    fn completed_session_rejects_all_submissions() {
        let mut session = session_at(Step::Action);
        session.status = SessionStatus::Completed;
        let err = validate(&session, Step::Action, "text", true).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyCompleted(_)));
    }

    #[test]
    fn apply_advances_exactly_one_step() {
        let mut session = session_at(Step::Situation);
        apply(&mut session, &StepInput::new(Step::Situation, "received a low test score"));
        assert_eq!(session.current_step, Step::Belief);
        assert_eq!(session.data.situation, "received a low test score");

        apply(&mut session, &StepInput::new(Step::Belief, "I'm stupid"));
        assert_eq!(session.current_step, Step::Reframe);
    }

    #[test]
    fn final_step_lands_on_complete() {
        let mut session = session_at(Step::Action);
        session.data.situation = "a".into();
        session.data.negative_belief = "b".into();
        session.data.reframed_belief = "c".into();

        apply(&mut session, &StepInput::new(Step::Action, "ask the teacher for help"));
        assert_eq!(session.current_step, Step::Complete);
        assert!(session.data.all_steps_filled());
    }

    #[test]
    fn step_back_moves_pointer_but_keeps_data() {
        let mut session = session_at(Step::Situation);
        apply(&mut session, &StepInput::new(Step::Situation, "what happened"));
        step_back(&mut session);
        assert_eq!(session.current_step, Step::Situation);
        assert_eq!(session.data.situation, "what happened");
    }
}
