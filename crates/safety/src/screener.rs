//! The safety screener — keyword baseline, AI escalation, alerting.

use crate::keywords::{KeywordScan, KeywordTiers};
use chrono::Utc;
use reframe_core::error::ProviderError;
use reframe_core::provider::GenerationRequest;
use reframe_core::{
    AlertNotification, AlertStatus, HelpResources, Provider, RiskAssessment, RiskLevel, Store,
    UrgentAlert,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The result returned to the caller of a safety check.
///
/// Every path — including screening failure — produces one of these with
/// an age-appropriate message and a help-resources payload attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub safe: bool,
    pub risk_level: RiskLevel,
    pub needs_adult_help: bool,
    pub message: String,
    pub resources: HelpResources,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_keywords: Vec<String>,
}

/// What the AI classification pass is asked to return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AiClassification {
    #[serde(default, rename = "riskLevel")]
    risk_level: String,

    #[serde(default)]
    concerns: Vec<String>,

    #[serde(default, rename = "immediateActionNeeded")]
    immediate_action_needed: bool,

    #[serde(default, rename = "recommendedActions")]
    recommended_actions: Vec<String>,
}

pub struct Screener {
    provider: Arc<dyn Provider>,
    store: Arc<dyn Store>,
    tiers: KeywordTiers,
    classification_temperature: f32,
    resources: HelpResources,
    enabled: bool,
}

impl Screener {
    pub fn new(
        config: &reframe_config::SafetyConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            provider,
            store,
            tiers: KeywordTiers::from_config(config),
            classification_temperature: config.classification_temperature,
            resources: resources_from_config(config),
            enabled: config.enabled,
        }
    }

    /// Screen one stretch of conversation text.
    ///
    /// Never returns an error: screening failures produce a cautionary
    /// verdict that still recommends adult help.
    pub async fn assess(
        &self,
        conversation: &str,
        session_id: Uuid,
        user_id: &str,
    ) -> SafetyVerdict {
        if !self.enabled {
            return self.verdict_for(RiskLevel::None, Vec::new());
        }

        // Tier 1: keyword baseline.
        let KeywordScan { level: keyword_level, detected } = self.tiers.scan(conversation);

        let mut final_level = keyword_level;
        let mut ai_analysis: Option<AiClassification> = None;
        let mut screening_failed = false;

        // Tier 2: AI classification, only when the baseline found something.
        if keyword_level != RiskLevel::None {
            match self.classify(conversation).await {
                Ok(classification) => {
                    let ai_level = RiskLevel::parse_lenient(&classification.risk_level);
                    // Risk only escalates from the keyword baseline.
                    final_level = keyword_level.max(ai_level);
                    ai_analysis = Some(classification);
                }
                Err(e) => {
                    warn!(error = %e, "Safety classification failed; keeping keyword baseline");
                    screening_failed = true;
                }
            }
        }

        let immediate = ai_analysis
            .as_ref()
            .is_some_and(|a| a.immediate_action_needed);

        // The assessment row is analytics; failures are logged, not surfaced.
        let assessment = RiskAssessment {
            session_id,
            user_id: user_id.to_string(),
            conversation_text: conversation.to_string(),
            detected_keywords: detected.clone(),
            risk_level: if screening_failed { RiskLevel::Unknown } else { final_level },
            ai_concerns: ai_analysis
                .as_ref()
                .map(|a| a.concerns.clone())
                .unwrap_or_default(),
            immediate_action_needed: immediate,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.record_risk_assessment(&assessment).await {
            warn!(error = %e, "Failed to record risk assessment");
        }

        // The alert is load-bearing: it must land whenever the level says
        // high, regardless of how the AI pass fared.
        if final_level == RiskLevel::High || immediate {
            if let Err(e) = self
                .write_alert(session_id, user_id, conversation, &detected, final_level, &ai_analysis)
                .await
            {
                error!(error = %e, session_id = %session_id, "Failed to write urgent alert");
                screening_failed = true;
            }
        }

        if screening_failed {
            return self.fallback_verdict(detected);
        }

        let mut verdict = self.verdict_for(final_level, detected);
        if immediate {
            verdict.needs_adult_help = true;
            verdict.safe = false;
        }
        verdict
    }

    async fn classify(&self, conversation: &str) -> Result<AiClassification, ProviderError> {
        let request = GenerationRequest::new(classification_prompt(conversation))
            .with_temperature(self.classification_temperature)
            .with_max_output_tokens(512);

        let response = self.provider.generate(request).await?;

        // Parse failure is not an error: the default classification does
        // not escalate, so the keyword baseline stands.
        Ok(reframe_providers::extract::extract_json(
            &response.text,
            AiClassification::default(),
        ))
    }

    async fn write_alert(
        &self,
        session_id: Uuid,
        user_id: &str,
        conversation: &str,
        detected: &[String],
        level: RiskLevel,
        ai_analysis: &Option<AiClassification>,
    ) -> Result<(), reframe_core::StoreError> {
        let alert = UrgentAlert {
            id: Uuid::new_v4(),
            session_id,
            user_id: user_id.to_string(),
            conversation_text: conversation.to_string(),
            detected_keywords: detected.to_vec(),
            risk_level: level,
            ai_analysis: ai_analysis
                .as_ref()
                .and_then(|a| serde_json::to_value(a).ok()),
            status: AlertStatus::Pending,
            created_at: Utc::now(),
        };

        self.store.record_urgent_alert(&alert).await?;

        info!(alert_id = %alert.id, session_id = %session_id, level = %level, "Urgent alert recorded");

        let notification = AlertNotification {
            id: Uuid::new_v4(),
            alert_id: alert.id,
            user_id: user_id.to_string(),
            audience: "guardian".into(),
            message: format!("Urgent: high-risk content detected in session {session_id}"),
            created_at: Utc::now(),
        };
        self.store.record_alert_notification(&notification).await
    }

    fn verdict_for(&self, level: RiskLevel, detected: Vec<String>) -> SafetyVerdict {
        SafetyVerdict {
            safe: matches!(level, RiskLevel::None | RiskLevel::Low),
            risk_level: level,
            needs_adult_help: matches!(level, RiskLevel::Medium | RiskLevel::High),
            message: risk_message(level).to_string(),
            resources: self.resources.clone(),
            detected_keywords: detected,
        }
    }

    /// The fail-safe verdict: ambiguity defaults toward caution.
    fn fallback_verdict(&self, detected: Vec<String>) -> SafetyVerdict {
        SafetyVerdict {
            safe: false,
            risk_level: RiskLevel::Unknown,
            needs_adult_help: true,
            message: "It's hard to tell exactly what's going on. It would be a good idea \
                      to ask a trusted adult for help."
                .into(),
            resources: self.resources.clone(),
            detected_keywords: detected,
        }
    }
}

fn risk_message(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "This situation really needs help from a trusted adult.",
        RiskLevel::Medium => "Your friend seems to be going through a lot right now.",
        RiskLevel::Low => "You're listening to your friend's feelings well.",
        RiskLevel::None => "You're doing great!",
        RiskLevel::Unknown => {
            "It's hard to tell exactly what's going on. It would be a good idea to ask a \
             trusted adult for help."
        }
    }
}

fn classification_prompt(conversation: &str) -> String {
    format!(
        "You are a child-safety specialist. Analyze the following conversation and \
         assess the safety risk to the child.\n\
         \n\
         Conversation: {conversation}\n\
         \n\
         Respond with only this JSON format:\n\
         {{\n\
           \"riskLevel\": \"none\" | \"low\" | \"medium\" | \"high\",\n\
           \"concerns\": [\"concern 1\", \"concern 2\"],\n\
           \"immediateActionNeeded\": true/false,\n\
           \"recommendedActions\": [\"action 1\", \"action 2\"]\n\
         }}"
    )
}

fn resources_from_config(config: &reframe_config::SafetyConfig) -> HelpResources {
    HelpResources {
        phone: config
            .help_lines
            .iter()
            .map(|l| (l.name.clone(), l.number.clone()))
            .collect(),
        online: config
            .help_sites
            .iter()
            .map(|s| (s.name.clone(), s.url.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reframe_providers::ScriptedProvider;
    use reframe_store::InMemoryStore;

    fn screener_with(
        provider: ScriptedProvider,
    ) -> (Screener, Arc<InMemoryStore>, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let store = Arc::new(InMemoryStore::new());
        let screener = Screener::new(
            &reframe_config::SafetyConfig::default(),
            provider.clone(),
            store.clone(),
        );
        (screener, store, provider)
    }

    #[tokio::test]
    async fn clean_text_skips_ai_and_reports_safe() {
        let (screener, store, provider) = screener_with(ScriptedProvider::always("unused"));

        let verdict = screener
            .assess("we played soccer after school", Uuid::new_v4(), "kid")
            .await;

        assert!(verdict.safe);
        assert_eq!(verdict.risk_level, RiskLevel::None);
        assert!(!verdict.needs_adult_help);
        assert!(provider.seen_prompts().is_empty());
        assert!(store.alerts().is_empty());
    }

    #[tokio::test]
    async fn high_keyword_writes_alert_even_when_ai_fails() {
        let (screener, store, _provider) = {
            let provider = ScriptedProvider::always("unused");
            provider.push_error(ProviderError::Timeout("scripted".into()));
            screener_with(provider)
        };

        let session_id = Uuid::new_v4();
        let verdict = screener
            .assess("I feel like I want to disappear", session_id, "kid")
            .await;

        // Fail-safe: screening trouble still recommends adult help.
        assert!(!verdict.safe);
        assert!(verdict.needs_adult_help);
        assert_eq!(verdict.risk_level, RiskLevel::Unknown);
        assert_eq!(verdict.detected_keywords, vec!["want to disappear"]);

        // The alert landed regardless of the AI outcome.
        let alerts = store.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].risk_level, RiskLevel::High);
        assert_eq!(alerts[0].session_id, session_id);
        assert_eq!(store.notifications().len(), 1);
    }

    #[tokio::test]
    async fn ai_escalates_medium_keyword_to_high() {
        let (screener, store, _provider) = {
            let provider = ScriptedProvider::always("unused");
            provider.push_reply(
                r#"{"riskLevel": "high", "concerns": ["escalating threats"],
                    "immediateActionNeeded": false, "recommendedActions": []}"#,
            );
            screener_with(provider)
        };

        let verdict = screener
            .assess("kids keep bullying me every day", Uuid::new_v4(), "kid")
            .await;

        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert!(verdict.needs_adult_help);
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn ai_cannot_deescalate_keyword_level() {
        let (screener, store, _provider) = {
            let provider = ScriptedProvider::always("unused");
            provider.push_reply(
                r#"{"riskLevel": "none", "concerns": [],
                    "immediateActionNeeded": false, "recommendedActions": []}"#,
            );
            screener_with(provider)
        };

        let verdict = screener
            .assess("I have been so depressed lately", Uuid::new_v4(), "kid")
            .await;

        // AI said none; keyword baseline (low) stands.
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert!(verdict.safe);
        assert!(store.alerts().is_empty());
        assert_eq!(store.assessments().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_classification_keeps_keyword_baseline() {
        let (screener, store, _provider) = {
            let provider = ScriptedProvider::always("unused");
            provider.push_reply("I am unable to classify this conversation.");
            screener_with(provider)
        };

        let verdict = screener
            .assess("someone hit me at school", Uuid::new_v4(), "kid")
            .await;

        assert_eq!(verdict.risk_level, RiskLevel::Medium);
        assert!(verdict.needs_adult_help);
        assert!(store.alerts().is_empty());
    }

    #[tokio::test]
    async fn immediate_action_flag_forces_alert_and_help() {
        let (screener, store, _provider) = {
            let provider = ScriptedProvider::always("unused");
            provider.push_reply(
                r#"{"riskLevel": "low", "concerns": ["mentions self-harm plans"],
                    "immediateActionNeeded": true, "recommendedActions": ["tell an adult"]}"#,
            );
            screener_with(provider)
        };

        let verdict = screener
            .assess("I'm scared about what happens at home", Uuid::new_v4(), "kid")
            .await;

        assert!(!verdict.safe);
        assert!(verdict.needs_adult_help);
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn every_verdict_carries_resources() {
        let (screener, _store, _provider) = screener_with(ScriptedProvider::always("unused"));

        let verdict = screener.assess("a normal chat", Uuid::new_v4(), "kid").await;
        assert!(!verdict.resources.phone.is_empty());
        assert!(!verdict.resources.online.is_empty());
    }
}
