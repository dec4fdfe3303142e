//! The counselor service — one object, one operation per endpoint.
//!
//! Constructed once at startup with its collaborators injected (provider,
//! store, gate); handlers share it via `Arc`. Every AI call goes through
//! the usage gate first and has a fixed fallback payload, so a child's
//! progress never blocks on AI availability. Only the standalone helper
//! operations surface the daily limit to the caller.

use crate::abc::{self, StepInput, StepOutcome};
use crate::gate::UsageGate;
use crate::payloads::{
    fallback_summary, BeliefGuidance, Evaluation, SolutionSet, Suggestion, TIP_CATEGORIES,
};
use crate::practice::{
    estimate_quality, hints, CounselingQuality, Personality, PracticeReply, HINT_THRESHOLD,
};
use crate::prompt;
use chrono::Utc;
use rand::Rng;
use reframe_core::error::{Error, SessionError};
use reframe_core::provider::GenerationRequest;
use reframe_core::{
    Provider, Result, Session, SessionData, SessionKind, SessionSummary, Step, StepResponse,
    Store,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Counselor {
    provider: Arc<dyn Provider>,
    store: Arc<dyn Store>,
    gate: UsageGate,
    temperature: f32,
    max_output_tokens: u32,
    default_age: u8,
    scoring: reframe_config::ScoringConfig,
}

impl Counselor {
    pub fn new(
        config: &reframe_config::AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn Store>,
    ) -> Self {
        let gate = UsageGate::new(store.clone(), config.usage.daily_limit);
        Self {
            provider,
            store,
            gate,
            temperature: config.default_temperature,
            max_output_tokens: config.max_output_tokens,
            default_age: config.default_student_age,
            scoring: config.scoring.clone(),
        }
    }

    pub fn gate(&self) -> &UsageGate {
        &self.gate
    }

    fn age_or_default(&self, age: Option<u8>) -> u8 {
        age.unwrap_or(self.default_age)
    }

    // ── Sessions ──────────────────────────────────────────────────────

    /// Start a new session. No safe fallback exists here, so store
    /// failures surface to the caller.
    pub async fn start_session(&self, user_id: &str, kind: SessionKind) -> Result<Session> {
        let session = Session::new(user_id, kind, Utc::now());
        self.store.create_session(&session).await?;
        info!(session_id = %session.id, user_id, ?kind, "Session started");
        Ok(session)
    }

    async fn owned_session(&self, session_id: Uuid, user_id: &str) -> Result<Session> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        // A session id belonging to someone else reads as not-found; the
        // caller learns nothing about other users' sessions.
        if session.user_id != user_id {
            return Err(SessionError::NotFound(session_id.to_string()).into());
        }
        Ok(session)
    }

    /// Submit input for the session's current step.
    ///
    /// Validation failures leave the session untouched. On acceptance the
    /// step's feedback payload is attached, the response is appended to
    /// the immutable history, and the pointer advances by one. The final
    /// step also triggers summary generation and finalization.
    pub async fn submit_step(
        &self,
        session_id: Uuid,
        user_id: &str,
        submission: StepInput,
    ) -> Result<StepOutcome> {
        let mut session = self.owned_session(session_id, user_id).await?;
        let step = submission.step;

        let has_belief_record = if step == Step::Reframe {
            self.store
                .step_responses(session_id)
                .await?
                .iter()
                .any(|r| r.step == Step::Belief)
        } else {
            true
        };

        abc::validate(&session, step, &submission.input, has_belief_record)
            .map_err(Error::Session)?;

        let feedback = self
            .step_feedback(user_id, &session, step, &submission.input)
            .await;

        abc::apply(&mut session, &submission);

        self.store
            .append_step_response(&StepResponse {
                id: Uuid::new_v4(),
                session_id,
                step,
                user_input: submission.input.trim().to_string(),
                scenario_id: submission.scenario_id,
                analysis: feedback.clone(),
                created_at: Utc::now(),
            })
            .await?;
        self.store.update_session(&session).await?;

        let summary = if session.current_step == Step::Complete {
            Some(self.complete(&mut session).await?)
        } else {
            None
        };

        Ok(StepOutcome {
            session,
            feedback,
            summary,
        })
    }

    /// Finalize a session explicitly.
    ///
    /// Idempotent: a completed session returns its stored summary. An
    /// active session must have every field filled; the first missing one
    /// is named in the error.
    pub async fn complete_session(
        &self,
        session_id: Uuid,
        user_id: &str,
    ) -> Result<SessionSummary> {
        let mut session = self.owned_session(session_id, user_id).await?;

        if let Some(summary) = session.summary.clone() {
            return Ok(summary);
        }

        for step in [Step::Situation, Step::Belief, Step::Reframe, Step::Action] {
            if session.data.field(step).trim().is_empty() {
                return Err(SessionError::MissingField {
                    step: step.name(),
                    field: step.required_field(),
                }
                .into());
            }
        }

        self.complete(&mut session).await
    }

    /// Move the session pointer back one step. History is untouched.
    pub async fn go_back(&self, session_id: Uuid, user_id: &str) -> Result<Session> {
        let mut session = self.owned_session(session_id, user_id).await?;
        if session.status == reframe_core::SessionStatus::Completed {
            return Err(SessionError::AlreadyCompleted(session_id.to_string()).into());
        }
        abc::step_back(&mut session);
        self.store.update_session(&session).await?;
        Ok(session)
    }

    /// Per-step feedback. Situation has none; belief gets the fixed
    /// guidance; reframe and action get gated AI feedback with fallback.
    async fn step_feedback(
        &self,
        user_id: &str,
        session: &Session,
        step: Step,
        input: &str,
    ) -> Option<serde_json::Value> {
        match step {
            Step::Situation | Step::Complete => None,
            Step::Belief => serde_json::to_value(BeliefGuidance::standard()).ok(),
            Step::Reframe => {
                let prompt = prompt::reframe_evaluation_prompt(
                    input,
                    &session.data.situation,
                    self.default_age,
                );
                let evaluation = self.gated_evaluation(user_id, prompt).await;
                self.maybe_award_skill(user_id, "reframing", evaluation.scores.overall)
                    .await;
                serde_json::to_value(evaluation).ok()
            }
            Step::Action => {
                let prompt = prompt::action_feedback_prompt(
                    input,
                    &session.data.situation,
                    self.default_age,
                );
                let evaluation = self.gated_evaluation(user_id, prompt).await;
                self.maybe_award_skill(user_id, "planning", evaluation.scores.overall)
                    .await;
                serde_json::to_value(evaluation).ok()
            }
        }
    }

    /// Gate + generate + normalize, falling back on any trouble. Used for
    /// calls embedded in step progression, which must never block.
    async fn gated_evaluation(&self, user_id: &str, prompt: String) -> Evaluation {
        let fallback = Evaluation::fallback(self.scoring.fallback_score);

        match self.gate.check_and_consume(user_id).await {
            Ok(decision) if decision.allowed => {}
            Ok(_) => {
                info!(user_id, "Daily AI allowance exhausted; using fallback feedback");
                return fallback;
            }
            Err(e) => {
                warn!(error = %e, "Usage gate unavailable; using fallback feedback");
                return fallback;
            }
        }

        let request = GenerationRequest::new(prompt)
            .with_temperature(self.temperature)
            .with_max_output_tokens(self.max_output_tokens);

        match self.provider.generate(request).await {
            Ok(response) => {
                let mut evaluation: Evaluation =
                    reframe_providers::extract::extract_json(&response.text, fallback);
                evaluation.scores = evaluation.scores.clamped();
                evaluation
            }
            Err(e) => {
                warn!(error = %e, "Feedback generation failed; using fallback");
                fallback
            }
        }
    }

    /// Generate the summary, finalize the session, and hand out rewards.
    async fn complete(&self, session: &mut Session) -> Result<SessionSummary> {
        let summary = self
            .generate_summary(&session.user_id, &session.data)
            .await;

        let completed_at = Utc::now();
        self.store
            .finalize_session(session.id, &summary, completed_at)
            .await?;
        session.status = reframe_core::SessionStatus::Completed;
        session.completed_at = Some(completed_at);
        session.summary = Some(summary.clone());

        // Rewards are fire-and-forget: a profile hiccup never fails the
        // completion the child is looking at.
        if let Err(e) = self.award_completion(session, completed_at).await {
            warn!(error = %e, session_id = %session.id, "Failed to award completion rewards");
        }

        info!(session_id = %session.id, overall = summary.scores.overall, "Session completed");
        Ok(summary)
    }

    async fn generate_summary(&self, user_id: &str, data: &SessionData) -> SessionSummary {
        let fallback = fallback_summary(self.scoring.fallback_score);

        let allowed = match self.gate.check_and_consume(user_id).await {
            Ok(decision) => decision.allowed,
            Err(e) => {
                warn!(error = %e, "Usage gate unavailable for summary; using fallback");
                false
            }
        };
        if !allowed {
            return fallback;
        }

        let request = GenerationRequest::new(prompt::summary_prompt(data, self.default_age))
            .with_temperature(self.temperature)
            .with_max_output_tokens(self.max_output_tokens);

        match self.provider.generate(request).await {
            Ok(response) => {
                let mut summary: SessionSummary =
                    reframe_providers::extract::extract_json(&response.text, fallback);
                summary.scores = summary.scores.clamped();
                summary
            }
            Err(e) => {
                warn!(error = %e, "Summary generation failed; using fallback");
                fallback
            }
        }
    }

    async fn award_completion(
        &self,
        session: &Session,
        completed_at: chrono::DateTime<Utc>,
    ) -> std::result::Result<(), reframe_core::StoreError> {
        let minutes = (completed_at - session.started_at).num_minutes().max(0) as u32;
        let xp = minutes * self.scoring.xp_per_minute + self.scoring.completion_xp;

        let mut profile = self.store.get_or_create_profile(&session.user_id).await?;
        let leveled_up = profile.add_experience(xp);
        profile.sessions_completed += 1;
        if profile.sessions_completed == 1 {
            profile.award_badge("first_session", "First Session", completed_at);
        }
        self.store.save_profile(&profile).await?;

        info!(
            user_id = %session.user_id,
            xp,
            level = profile.level,
            leveled_up,
            "Completion rewards applied"
        );
        Ok(())
    }

    async fn maybe_award_skill(&self, user_id: &str, skill: &str, overall: u8) {
        if overall < self.scoring.skill_threshold {
            return;
        }
        let result = async {
            let mut profile = self.store.get_or_create_profile(user_id).await?;
            profile.add_skill_points(skill, self.scoring.skill_points);
            self.store.save_profile(&profile).await
        }
        .await;

        if let Err(e) = result {
            warn!(error = %e, user_id, skill, "Failed to award skill points");
        }
    }

    // ── Standalone operations ─────────────────────────────────────────

    /// Evaluate a reframed belief outside a session flow.
    ///
    /// Surfaces the daily limit; provider trouble falls back.
    pub async fn analyze_reframe(
        &self,
        user_id: &str,
        response_text: &str,
        situation: &str,
        age: Option<u8>,
    ) -> Result<Evaluation> {
        self.consume_or_limit(user_id).await?;

        let request = GenerationRequest::new(prompt::reframe_evaluation_prompt(
            response_text,
            situation,
            self.age_or_default(age),
        ))
        .with_temperature(self.temperature)
        .with_max_output_tokens(self.max_output_tokens);

        let fallback = Evaluation::fallback(self.scoring.fallback_score);
        let evaluation = match self.provider.generate(request).await {
            Ok(response) => {
                let mut evaluation: Evaluation =
                    reframe_providers::extract::extract_json(&response.text, fallback);
                evaluation.scores = evaluation.scores.clamped();
                evaluation
            }
            Err(e) => {
                warn!(error = %e, "Reframe analysis failed; using fallback");
                fallback
            }
        };

        self.maybe_award_skill(user_id, "reframing", evaluation.scores.overall)
            .await;
        Ok(evaluation)
    }

    /// Suggest an empathetic thing to say. The tip category is picked at
    /// random here — the prompt builder itself stays deterministic.
    pub async fn suggest(
        &self,
        user_id: &str,
        situation: &str,
        emotions: &[String],
        age: Option<u8>,
    ) -> Result<Suggestion> {
        self.consume_or_limit(user_id).await?;

        let request = GenerationRequest::new(prompt::suggestion_prompt(
            situation,
            emotions,
            self.age_or_default(age),
        ))
        .with_temperature(self.temperature)
        .with_max_output_tokens(self.max_output_tokens);

        let suggestion = match self.provider.generate(request).await {
            Ok(response) => response.text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Suggestion generation failed; using fallback");
                "I can tell that was really hard for you. I'm here if you want to talk."
                    .to_string()
            }
        };

        let category = rand::rng().random_range(0..TIP_CATEGORIES.len());
        Ok(Suggestion {
            suggestion,
            tips: TIP_CATEGORIES[category].iter().map(|t| t.to_string()).collect(),
        })
    }

    /// CBT solution suggestions for a problem and its negative thought.
    pub async fn solutions(
        &self,
        user_id: &str,
        problem: &str,
        negative_thought: &str,
        age: Option<u8>,
    ) -> Result<SolutionSet> {
        self.consume_or_limit(user_id).await?;

        let request = GenerationRequest::new(prompt::solutions_prompt(
            problem,
            negative_thought,
            self.age_or_default(age),
        ))
        .with_temperature(0.8)
        .with_max_output_tokens(self.max_output_tokens);

        match self.provider.generate(request).await {
            Ok(response) => Ok(SolutionSet::parse_sectioned(&response.text)),
            Err(e) => {
                warn!(error = %e, "Solution generation failed; using fallback");
                Ok(SolutionSet::fallback())
            }
        }
    }

    /// Score a full set of the four fields without a session.
    pub async fn evaluate_abc(
        &self,
        user_id: &str,
        data: &SessionData,
        age: Option<u8>,
    ) -> Result<SessionSummary> {
        for (value, step) in [
            (&data.situation, Step::Situation),
            (&data.negative_belief, Step::Belief),
            (&data.reframed_belief, Step::Reframe),
            (&data.action_plan, Step::Action),
        ] {
            if value.trim().is_empty() {
                return Err(SessionError::MissingField {
                    step: step.name(),
                    field: step.required_field(),
                }
                .into());
            }
        }

        self.consume_or_limit(user_id).await?;

        let request =
            GenerationRequest::new(prompt::summary_prompt(data, self.age_or_default(age)))
                .with_temperature(self.temperature)
                .with_max_output_tokens(self.max_output_tokens);

        let fallback = fallback_summary(self.scoring.fallback_score);
        match self.provider.generate(request).await {
            Ok(response) => {
                let mut summary: SessionSummary =
                    reframe_providers::extract::extract_json(&response.text, fallback);
                summary.scores = summary.scores.clamped();
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "ABC evaluation failed; using fallback");
                Ok(fallback)
            }
        }
    }

    /// One practice-mode turn against the virtual friend.
    pub async fn practice_reply(
        &self,
        user_id: &str,
        personality: Personality,
        problem: &str,
        history: &[(String, String)],
        counselor_message: &str,
    ) -> Result<PracticeReply> {
        self.consume_or_limit(user_id).await?;

        let request = GenerationRequest::new(prompt::virtual_friend_prompt(
            personality.framing(),
            problem,
            history,
            counselor_message,
        ))
        .with_temperature(self.temperature)
        .with_max_output_tokens(self.max_output_tokens);

        let friend_response = match self.provider.generate(request).await {
            Ok(response) => response.text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Virtual friend reply failed; using canned line");
                personality.fallback_reply().to_string()
            }
        };

        let quality: CounselingQuality = estimate_quality(counselor_message);
        let hints = (quality.score < HINT_THRESHOLD).then(hints);

        Ok(PracticeReply {
            friend_response,
            quality,
            hints,
        })
    }

    /// Replay a session's append-only history into the data object it
    /// produces. Later records supersede earlier ones within a step.
    pub async fn replay_history(&self, session_id: Uuid) -> Result<SessionData> {
        let mut data = SessionData::default();
        for record in self.store.step_responses(session_id).await? {
            match record.step {
                Step::Situation => data.situation = record.user_input,
                Step::Belief => data.negative_belief = record.user_input,
                Step::Reframe => data.reframed_belief = record.user_input,
                Step::Action => data.action_plan = record.user_input,
                Step::Complete => {}
            }
        }
        Ok(data)
    }

    async fn consume_or_limit(&self, user_id: &str) -> Result<()> {
        let decision = self.gate.check_and_consume(user_id).await?;
        if !decision.allowed {
            return Err(Error::DailyLimitReached {
                limit: self.gate.limit(),
            });
        }
        Ok(())
    }
}
